//! # ArborDB Core
//!
//! Repository, query builder, and tenant scoping for ArborDB.
//!
//! This crate is the application-facing layer of ArborDB:
//! - [`Repository`] - save/fetch/destroy/query entry points over a shared
//!   [`Datastore`]
//! - [`Query`] - the fluent builder: filters, ancestor scope, native and
//!   post-fetch orders, limits, and cursor pagination
//! - [`EntityModel`] - the compile-time schema trait mapping application
//!   types to entities
//! - [`QueryOptions`] - structured JSON documents driving a builder
//! - [`NamespaceStack`] - per-context tenant scoping with guaranteed
//!   release
//!
//! ## Quick start
//!
//! ```
//! use arbordb_codec::{Entity, Key, PropertyValue};
//! use arbordb_core::{CoreError, CoreResult, EntityModel, Repository};
//! use arbordb_store::Direction;
//!
//! struct Task {
//!     key: Option<Key>,
//!     title: String,
//!     priority: i64,
//! }
//!
//! impl EntityModel for Task {
//!     const KIND: &'static str = "Task";
//!
//!     fn key(&self) -> Option<Key> {
//!         self.key.clone()
//!     }
//!
//!     fn set_key(&mut self, key: Key) {
//!         self.key = Some(key);
//!     }
//!
//!     fn to_properties(&self) -> CoreResult<Vec<(String, PropertyValue)>> {
//!         Ok(vec![
//!             ("title".into(), self.title.clone().into()),
//!             ("priority".into(), self.priority.into()),
//!         ])
//!     }
//!
//!     fn from_entity(entity: &Entity) -> CoreResult<Self> {
//!         Ok(Task {
//!             key: Some(entity.key().clone()),
//!             title: entity
//!                 .get("title")
//!                 .and_then(|v| v.as_text())
//!                 .ok_or_else(|| CoreError::conversion("missing title"))?
//!                 .to_string(),
//!             priority: entity
//!                 .get("priority")
//!                 .and_then(|v| v.as_integer())
//!                 .unwrap_or(0),
//!         })
//!     }
//! }
//!
//! let repository = Repository::in_memory();
//!
//! let mut task = Task { key: None, title: "ship it".into(), priority: 2 };
//! repository.save(&mut task).unwrap();
//!
//! let urgent = repository
//!     .query::<Task>()
//!     .filter("priority", ">=", 2)
//!     .order("priority", Direction::Descending)
//!     .list()
//!     .unwrap();
//! assert_eq!(urgent.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod model;
mod namespace;
mod options;
mod query;
mod repository;

pub use error::{CoreError, CoreResult};
pub use model::EntityModel;
pub use namespace::{NamespaceGuard, NamespaceStack};
pub use options::{QueryOptions, WhereTriple};
pub use query::{ChildLoader, Query};
pub use repository::Repository;

// Re-export the data model and engine types that appear in this crate's
// public API, so most applications only depend on `arbordb_core`.
pub use arbordb_codec::{Entity, Key, KeyId, PathElement, PropertyValue};
pub use arbordb_store::{
    Datastore, Direction, JournalDatastore, MemoryDatastore, Namespace, StoreConfig,
};
