//! End-to-end repository scenarios.

use arbordb_core::{Direction, JournalDatastore, QueryOptions, Repository, StoreConfig};
use arbordb_testkit::{populate_widgets, Project, Task, TestRepository, Widget};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn widget_counting_scenario() {
    let test = TestRepository::memory();

    populate_widgets(&test, 3, 1);
    let mut odd_one = Widget::new("widget3", 2);
    test.save(&mut odd_one).unwrap();

    let ones = test
        .query::<Widget>()
        .filter("count", "=", 1)
        .list()
        .unwrap();
    assert_eq!(ones.len(), 3);

    let all = test
        .query::<Widget>()
        .order("count", Direction::Descending)
        .list()
        .unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].count, 2);
}

#[test]
fn consecutive_saves_never_overwrite_each_other() {
    let test = TestRepository::memory();

    let mut first = Widget::new("first", 1);
    let mut second = Widget::new("second", 1);
    let first_key = test.save(&mut first).unwrap();
    let second_key = test.save(&mut second).unwrap();
    assert_ne!(first_key, second_key);

    let fetched: Widget = test.fetch(&first_key).unwrap().unwrap();
    assert_eq!(fetched.label, "first");
}

#[test]
fn direct_lookup_populates_declared_children() {
    let test = TestRepository::memory();

    let mut home = Project::new("home");
    let home_key = test.save(&mut home).unwrap();
    let mut work = Project::new("work");
    let work_key = test.save(&mut work).unwrap();

    for (parent, title) in [
        (&home_key, "dishes"),
        (&home_key, "laundry"),
        (&work_key, "report"),
    ] {
        let mut task = Task::under(parent, title, 1);
        test.save(&mut task).unwrap();
    }

    let loaded: Project = test.fetch(&home_key).unwrap().unwrap();
    let mut titles: Vec<&str> = loaded.tasks.iter().map(|t| t.title.as_str()).collect();
    titles.sort_unstable();
    assert_eq!(titles, vec!["dishes", "laundry"]);

    let other: Project = test.fetch(&work_key).unwrap().unwrap();
    assert_eq!(other.tasks.len(), 1);
    assert_eq!(other.tasks[0].title, "report");
}

#[test]
fn querying_projects_does_not_populate_children() {
    let test = TestRepository::memory();

    let mut project = Project::new("solo");
    let key = test.save(&mut project).unwrap();
    let mut task = Task::under(&key, "only", 1);
    test.save(&mut task).unwrap();

    let listed: Vec<Project> = test.all().unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].tasks.is_empty());
}

#[test]
fn ancestor_scope_excludes_other_parents_tasks() {
    let test = TestRepository::memory();

    let mut a = Project::new("a");
    let a_key = test.save(&mut a).unwrap();
    let mut b = Project::new("b");
    let b_key = test.save(&mut b).unwrap();

    let mut shared_a = Task::under(&a_key, "shared", 1);
    test.save(&mut shared_a).unwrap();
    let mut shared_b = Task::under(&b_key, "shared", 2);
    test.save(&mut shared_b).unwrap();

    let tasks = test
        .query::<Task>()
        .parent(a_key)
        .filter("title", "=", "shared")
        .list()
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].priority, 1);
}

#[test]
fn cursor_walk_is_strictly_decreasing_without_repeats() {
    let test = TestRepository::memory();
    for count in 1..=3 {
        let mut widget = Widget::new(format!("w{count}"), count);
        test.save(&mut widget).unwrap();
    }

    let mut query = test
        .query::<Widget>()
        .order("count", Direction::Descending)
        .limit(1);

    let page = query.list().unwrap();
    assert_eq!(page[0].count, 3);

    let page = query.list().unwrap();
    assert_eq!(page[0].count, 2);

    // A fresh builder with the carried cursor resumes where the old one
    // stopped.
    let token = query.current_cursor().unwrap().to_string();
    let mut resumed = test
        .query::<Widget>()
        .order("count", Direction::Descending)
        .limit(1)
        .cursor(token);
    let page = resumed.list().unwrap();
    assert_eq!(page[0].count, 1);

    assert!(resumed.list().unwrap().is_empty());
}

#[test]
fn options_document_end_to_end() {
    let test = TestRepository::memory();

    for label in ["object1", "object2", "object3"] {
        let mut widget = Widget::new(label, 1);
        test.save(&mut widget).unwrap();
    }
    let mut other = Widget::new("object4", 2);
    test.save(&mut other).unwrap();

    let options = QueryOptions::parse(
        r#"{"where": ["count", "=", 1],
            "order": [{"p": "label", "d": "desc"}],
            "limit": 2}"#,
    )
    .unwrap();

    let results = test.query::<Widget>().options(&options).list().unwrap();
    let labels: Vec<&str> = results.iter().map(|w| w.label.as_str()).collect();
    assert_eq!(labels, vec!["object3", "object2"]);
}

#[test]
fn unicode_labels_filter_and_order_by_codepoint() {
    let test = TestRepository::memory();

    for label in ["object1", "object2", "object3", "\u{c1}"] {
        let mut widget = Widget::new(label, 1);
        test.save(&mut widget).unwrap();
    }

    let exact = test
        .query::<Widget>()
        .filter("label", "=", "\u{c1}")
        .list()
        .unwrap();
    assert_eq!(exact.len(), 1);

    // U+00C1 is above every ASCII letter in codepoint order, so it leads
    // a descending sort.
    let ordered = test
        .query::<Widget>()
        .order("label", Direction::Descending)
        .list()
        .unwrap();
    let labels: Vec<&str> = ordered.iter().map(|w| w.label.as_str()).collect();
    assert_eq!(labels, vec!["\u{c1}", "object3", "object2", "object1"]);
}

#[test]
fn native_order_fixes_pages_post_sort_reorders_within_them() {
    let test = TestRepository::memory();

    for (label, count) in [("b", 2), ("a", 2), ("d", 1), ("c", 1)] {
        let mut widget = Widget::new(label, count);
        test.save(&mut widget).unwrap();
    }

    let mut query = test
        .query::<Widget>()
        .order("count", Direction::Descending)
        .sort("label", Direction::Ascending)
        .limit(2);

    // Page one holds the count=2 widgets, post-sorted by label.
    let page = query.list().unwrap();
    let labels: Vec<&str> = page.iter().map(|w| w.label.as_str()).collect();
    assert_eq!(labels, vec!["a", "b"]);

    // Page two holds the count=1 widgets, again post-sorted.
    let page = query.list().unwrap();
    let labels: Vec<&str> = page.iter().map(|w| w.label.as_str()).collect();
    assert_eq!(labels, vec!["c", "d"]);
}

#[test]
fn durable_repository_survives_reopen() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("store");

    let key = {
        let store = JournalDatastore::open(&path, StoreConfig::default()).unwrap();
        let repository = Repository::new(Arc::new(store));
        let mut widget = Widget::new("persisted", 7);
        repository.save(&mut widget).unwrap()
    };

    let store = JournalDatastore::open(&path, StoreConfig::default()).unwrap();
    let repository = Repository::new(Arc::new(store));

    let fetched: Widget = repository.fetch(&key).unwrap().unwrap();
    assert_eq!(fetched.label, "persisted");
    assert_eq!(fetched.count, 7);

    let results = repository
        .query::<Widget>()
        .filter("count", "=", 7)
        .list()
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[test]
fn concurrent_repositories_do_not_leak_scopes_into_each_other() {
    let test = TestRepository::memory();

    populate_widgets(&test, 1, 1);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let repository = Repository::in_memory();
                for j in 0..10 {
                    let mut widget = Widget::new(format!("w{i}-{j}"), j);
                    repository.save(&mut widget).unwrap();
                }
                assert_eq!(repository.all::<Widget>().unwrap().len(), 10);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // The original repository saw none of the other contexts' data.
    assert_eq!(test.all::<Widget>().unwrap().len(), 1);
}
