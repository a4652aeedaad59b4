//! The repository facade.

use crate::error::CoreResult;
use crate::model::EntityModel;
use crate::namespace::NamespaceStack;
use crate::query::Query;
use arbordb_codec::Key;
use arbordb_store::{Datastore, MemoryDatastore};
use std::sync::Arc;
use tracing::debug;

/// The application entry point to an entity store.
///
/// A repository pairs a [`Datastore`] handle with the tenant scope stack
/// for one logical execution context. Every public operation enters the
/// namespace derived from the target kind and releases it on all exit
/// paths.
///
/// Use one repository per request or worker task; clone the underlying
/// `Arc<dyn Datastore>` into as many repositories as there are concurrent
/// contexts - the store is shared, the scope state is not.
///
/// # Example
///
/// ```
/// use arbordb_codec::{Entity, Key, PropertyValue};
/// use arbordb_core::{CoreError, CoreResult, EntityModel, Repository};
///
/// struct Person {
///     key: Option<Key>,
///     name: String,
/// }
/// # impl EntityModel for Person {
/// #     const KIND: &'static str = "Person";
/// #     fn key(&self) -> Option<Key> { self.key.clone() }
/// #     fn set_key(&mut self, key: Key) { self.key = Some(key); }
/// #     fn to_properties(&self) -> CoreResult<Vec<(String, PropertyValue)>> {
/// #         Ok(vec![("name".into(), self.name.clone().into())])
/// #     }
/// #     fn from_entity(entity: &Entity) -> CoreResult<Self> {
/// #         let name = entity.get("name").and_then(|v| v.as_text())
/// #             .ok_or_else(|| CoreError::conversion("missing name"))?;
/// #         Ok(Person { key: Some(entity.key().clone()), name: name.into() })
/// #     }
/// # }
///
/// let repository = Repository::in_memory();
///
/// let mut person = Person { key: None, name: "jim".into() };
/// let key = repository.save(&mut person).unwrap();
///
/// let found: Person = repository.fetch(&key).unwrap().unwrap();
/// assert_eq!(found.name, "jim");
/// ```
pub struct Repository {
    datastore: Arc<dyn Datastore>,
    scopes: NamespaceStack,
}

impl Repository {
    /// Creates a repository over a shared datastore.
    #[must_use]
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self {
            datastore,
            scopes: NamespaceStack::new(),
        }
    }

    /// Creates a repository over a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDatastore::new()))
    }

    /// Saves an object, assigning a key if it doesn't have one.
    ///
    /// The assigned key is written back onto the object and returned.
    /// Saving an object that already has a complete key overwrites the
    /// stored entity.
    ///
    /// # Errors
    ///
    /// Propagates conversion and store failures.
    pub fn save<T: EntityModel>(&self, model: &mut T) -> CoreResult<Key> {
        let namespace = T::namespace();
        let _scope = self.scopes.enter(namespace.clone());

        let entity = model.to_entity()?;
        let key = self.datastore.put(&namespace, entity)?;
        debug!(kind = T::KIND, key = %key, "saved entity");
        model.set_key(key.clone());
        Ok(key)
    }

    /// Fetches an object by key, populating declared child collections.
    ///
    /// # Errors
    ///
    /// Propagates store and conversion failures; absence is `Ok(None)`.
    pub fn fetch<T: EntityModel>(&self, key: &Key) -> CoreResult<Option<T>> {
        self.query::<T>().by_key(key)
    }

    /// Deletes the entity stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Propagates store failures; deleting an absent key succeeds.
    pub fn destroy<T: EntityModel>(&self, key: &Key) -> CoreResult<()> {
        let namespace = T::namespace();
        let _scope = self.scopes.enter(namespace.clone());

        self.datastore.delete(&namespace, key)?;
        debug!(kind = T::KIND, key = %key, "deleted entity");
        Ok(())
    }

    /// Starts a query over entities of kind `T`.
    #[must_use]
    pub fn query<T: EntityModel>(&self) -> Query<'_, T> {
        Query::new(self)
    }

    /// Lists every entity of kind `T`.
    ///
    /// # Errors
    ///
    /// Propagates store and conversion failures.
    pub fn all<T: EntityModel>(&self) -> CoreResult<Vec<T>> {
        self.query::<T>().list()
    }

    pub(crate) fn datastore(&self) -> &dyn Datastore {
        self.datastore.as_ref()
    }

    pub(crate) fn scopes(&self) -> &NamespaceStack {
        &self.scopes
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("scope_depth", &self.scopes.depth())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, CoreResult};
    use arbordb_codec::{Entity, PropertyValue};

    #[derive(Debug, PartialEq)]
    struct Note {
        key: Option<Key>,
        text: String,
    }

    impl EntityModel for Note {
        const KIND: &'static str = "Note";

        fn key(&self) -> Option<Key> {
            self.key.clone()
        }

        fn set_key(&mut self, key: Key) {
            self.key = Some(key);
        }

        fn to_properties(&self) -> CoreResult<Vec<(String, PropertyValue)>> {
            Ok(vec![("text".into(), self.text.clone().into())])
        }

        fn from_entity(entity: &Entity) -> CoreResult<Self> {
            let text = entity
                .get("text")
                .and_then(|v| v.as_text())
                .ok_or_else(|| CoreError::conversion("missing text"))?
                .to_string();
            Ok(Self {
                key: Some(entity.key().clone()),
                text,
            })
        }
    }

    #[test]
    fn save_assigns_and_writes_back_key() {
        let repository = Repository::in_memory();
        let mut note = Note {
            key: None,
            text: "hello".into(),
        };

        let key = repository.save(&mut note).unwrap();
        assert!(key.is_complete());
        assert_eq!(note.key, Some(key));
    }

    #[test]
    fn saved_objects_keep_distinct_keys() {
        let repository = Repository::in_memory();
        let mut first = Note {
            key: None,
            text: "first".into(),
        };
        let mut second = Note {
            key: None,
            text: "second".into(),
        };

        let first_key = repository.save(&mut first).unwrap();
        repository.save(&mut second).unwrap();

        let fetched: Note = repository.fetch(&first_key).unwrap().unwrap();
        assert_eq!(fetched.text, "first");
    }

    #[test]
    fn resave_overwrites() {
        let repository = Repository::in_memory();
        let mut note = Note {
            key: None,
            text: "before".into(),
        };
        let key = repository.save(&mut note).unwrap();

        note.text = "after".into();
        let same_key = repository.save(&mut note).unwrap();
        assert_eq!(key, same_key);

        let fetched: Note = repository.fetch(&key).unwrap().unwrap();
        assert_eq!(fetched.text, "after");
    }

    #[test]
    fn destroy_then_fetch_is_none() {
        let repository = Repository::in_memory();
        let mut note = Note {
            key: None,
            text: "bye".into(),
        };
        let key = repository.save(&mut note).unwrap();

        repository.destroy::<Note>(&key).unwrap();
        assert!(repository.fetch::<Note>(&key).unwrap().is_none());

        // Idempotent.
        repository.destroy::<Note>(&key).unwrap();
    }

    #[test]
    fn all_lists_every_saved_entity() {
        let repository = Repository::in_memory();
        for text in ["a", "b", "c"] {
            let mut note = Note {
                key: None,
                text: text.into(),
            };
            repository.save(&mut note).unwrap();
        }

        let notes: Vec<Note> = repository.all().unwrap();
        assert_eq!(notes.len(), 3);
    }

    #[test]
    fn scope_is_clear_after_every_operation() {
        let repository = Repository::in_memory();
        let mut note = Note {
            key: None,
            text: "x".into(),
        };

        let key = repository.save(&mut note).unwrap();
        assert_eq!(repository.scopes().depth(), 0);

        let _ = repository.fetch::<Note>(&key).unwrap();
        assert_eq!(repository.scopes().depth(), 0);

        repository.destroy::<Note>(&key).unwrap();
        assert_eq!(repository.scopes().depth(), 0);
    }

    #[test]
    fn repositories_share_a_store_but_not_scopes() {
        let store: Arc<dyn Datastore> = Arc::new(MemoryDatastore::new());
        let writer = Repository::new(Arc::clone(&store));
        let reader = Repository::new(store);

        let mut note = Note {
            key: None,
            text: "shared".into(),
        };
        let key = writer.save(&mut note).unwrap();

        let fetched: Note = reader.fetch(&key).unwrap().unwrap();
        assert_eq!(fetched.text, "shared");
        assert_eq!(reader.scopes().depth(), 0);
        assert_eq!(writer.scopes().depth(), 0);
    }
}
