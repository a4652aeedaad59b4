//! Test fixtures and repository helpers.
//!
//! Provides sample [`EntityModel`] types and convenience constructors for
//! setting up test repositories, in memory or durable.

use arbordb_codec::{Entity, Key, PropertyValue};
use arbordb_core::{ChildLoader, CoreError, CoreResult, EntityModel, Repository};
use arbordb_store::{JournalDatastore, StoreConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A project that owns a list of [`Task`] children.
///
/// The `tasks` field is a declared child-list relation: it stays empty
/// after a query and is populated on a direct key lookup.
#[derive(Debug, Default)]
pub struct Project {
    /// Assigned at save time.
    pub key: Option<Key>,
    /// Project name.
    pub name: String,
    /// Child tasks, populated by the list-loader on direct lookup.
    pub tasks: Vec<Task>,
}

impl Project {
    /// Creates an unsaved project.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            key: None,
            name: name.into(),
            tasks: Vec::new(),
        }
    }
}

impl EntityModel for Project {
    const KIND: &'static str = "Project";

    fn key(&self) -> Option<Key> {
        self.key.clone()
    }

    fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    fn to_properties(&self) -> CoreResult<Vec<(String, PropertyValue)>> {
        Ok(vec![("name".into(), self.name.clone().into())])
    }

    fn from_entity(entity: &Entity) -> CoreResult<Self> {
        Ok(Self {
            key: Some(entity.key().clone()),
            name: text_property(entity, "name")?,
            tasks: Vec::new(),
        })
    }

    fn load_children(&mut self, loader: &ChildLoader<'_>) -> CoreResult<()> {
        if let Some(key) = &self.key {
            self.tasks = loader.children_of::<Task>(key)?;
        }
        Ok(())
    }
}

/// A task, usually stored as a child of a [`Project`].
#[derive(Debug, Default)]
pub struct Task {
    /// Assigned at save time.
    pub key: Option<Key>,
    /// Task title.
    pub title: String,
    /// Task priority; higher is more urgent.
    pub priority: i64,
    /// Completion flag.
    pub done: bool,
}

impl Task {
    /// Creates an unsaved root task.
    #[must_use]
    pub fn new(title: impl Into<String>, priority: i64) -> Self {
        Self {
            key: None,
            title: title.into(),
            priority,
            done: false,
        }
    }

    /// Creates an unsaved task under a parent key.
    #[must_use]
    pub fn under(parent: &Key, title: impl Into<String>, priority: i64) -> Self {
        Self {
            key: Some(parent.child(Self::KIND)),
            title: title.into(),
            priority,
            done: false,
        }
    }
}

impl EntityModel for Task {
    const KIND: &'static str = "Task";

    fn key(&self) -> Option<Key> {
        self.key.clone()
    }

    fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    fn to_properties(&self) -> CoreResult<Vec<(String, PropertyValue)>> {
        Ok(vec![
            ("title".into(), self.title.clone().into()),
            ("priority".into(), self.priority.into()),
            ("done".into(), self.done.into()),
        ])
    }

    fn from_entity(entity: &Entity) -> CoreResult<Self> {
        Ok(Self {
            key: Some(entity.key().clone()),
            title: text_property(entity, "title")?,
            priority: entity
                .get("priority")
                .and_then(PropertyValue::as_integer)
                .unwrap_or(0),
            done: entity
                .get("done")
                .and_then(PropertyValue::as_bool)
                .unwrap_or(false),
        })
    }
}

/// A flat entity with a label and a count, for filter and order tests.
#[derive(Debug, Default)]
pub struct Widget {
    /// Assigned at save time.
    pub key: Option<Key>,
    /// Display label.
    pub label: String,
    /// Arbitrary counter.
    pub count: i64,
}

impl Widget {
    /// Creates an unsaved widget.
    #[must_use]
    pub fn new(label: impl Into<String>, count: i64) -> Self {
        Self {
            key: None,
            label: label.into(),
            count,
        }
    }
}

impl EntityModel for Widget {
    const KIND: &'static str = "Widget";

    fn key(&self) -> Option<Key> {
        self.key.clone()
    }

    fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    fn to_properties(&self) -> CoreResult<Vec<(String, PropertyValue)>> {
        Ok(vec![
            ("label".into(), self.label.clone().into()),
            ("count".into(), self.count.into()),
        ])
    }

    fn from_entity(entity: &Entity) -> CoreResult<Self> {
        Ok(Self {
            key: Some(entity.key().clone()),
            label: text_property(entity, "label")?,
            count: entity
                .get("count")
                .and_then(PropertyValue::as_integer)
                .unwrap_or(0),
        })
    }
}

fn text_property(entity: &Entity, name: &str) -> CoreResult<String> {
    entity
        .get(name)
        .and_then(PropertyValue::as_text)
        .map(str::to_string)
        .ok_or_else(|| CoreError::conversion(format!("missing text property {name:?}")))
}

/// A test repository with automatic cleanup.
pub struct TestRepository {
    /// The repository under test.
    pub repository: Repository,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestRepository {
    /// Creates a repository over a fresh in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            repository: Repository::in_memory(),
            _temp_dir: None,
        }
    }

    /// Creates a repository over a durable store in a temp directory.
    #[must_use]
    pub fn durable() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("store");
        let store = JournalDatastore::open(&path, StoreConfig::default())
            .expect("failed to open durable store");
        Self {
            repository: Repository::new(Arc::new(store)),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the durable store path, or `None` for in-memory.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("store"))
    }
}

impl std::ops::Deref for TestRepository {
    type Target = Repository;

    fn deref(&self) -> &Self::Target {
        &self.repository
    }
}

/// Runs a test with a fresh in-memory repository.
///
/// # Example
///
/// ```rust,ignore
/// use arbordb_testkit::{with_repository, Widget};
///
/// #[test]
/// fn my_test() {
///     with_repository(|repository| {
///         let mut widget = Widget::new("a", 1);
///         repository.save(&mut widget).unwrap();
///     });
/// }
/// ```
pub fn with_repository<F, R>(f: F) -> R
where
    F: FnOnce(&Repository) -> R,
{
    let test = TestRepository::memory();
    f(&test.repository)
}

/// Saves `count` widgets labeled `widget0..widgetN`, all with the given
/// count value.
pub fn populate_widgets(repository: &Repository, count: usize, value: i64) -> Vec<Key> {
    (0..count)
        .map(|i| {
            let mut widget = Widget::new(format!("widget{i}"), value);
            repository
                .save(&mut widget)
                .expect("failed to save widget")
        })
        .collect()
}
