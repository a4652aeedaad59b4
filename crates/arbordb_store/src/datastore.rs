//! The storage engine contract.

use crate::error::StoreResult;
use crate::query::{NativeQuery, QueryResponse};
use arbordb_codec::{Entity, Key};
use std::fmt;

/// A logical data partition selecting which tenant an operation targets.
///
/// Namespaces are plain values; the scope machinery that pushes and pops
/// the active namespace around every operation lives in the core crate.
/// Every `Datastore` method takes the namespace explicitly - there is no
/// ambient tenant state anywhere in the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Creates a namespace with an explicit identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the namespace for an entity kind.
    ///
    /// The derivation is deterministic: one kind always maps to the same
    /// tenant partition.
    #[must_use]
    pub fn for_kind(kind: &str) -> Self {
        Self(format!("kind/{kind}"))
    }

    /// Returns the namespace identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The entity storage engine for ArborDB.
///
/// A `Datastore` persists entities keyed by their hierarchical [`Key`] and
/// answers single-kind queries optionally scoped to an ancestor. The
/// contract every implementation must honor:
///
/// - `put` assigns the next numeric identifier when the entity's key is
///   incomplete, and otherwise upserts by key with a full overwrite of the
///   property bag; each put is atomic per key
/// - `get` returns `None` for an absent key - absence is not an error
/// - `delete` is idempotent; deleting an absent key succeeds
/// - `run_query` applies the kind filter, ancestor containment (the
///   entity's key path must extend the ancestor's), property filters,
///   native orders, cursor skip, and limit, and returns a cursor that
///   resumes immediately after the last returned entity
///
/// All operations are synchronous, blocking calls that complete with a
/// full result or an error; there is no streaming delivery.
///
/// # Implementors
///
/// - [`crate::MemoryDatastore`] - in-memory engine, also the semantics
///   reference
/// - [`crate::JournalDatastore`] - durable engine backed by an
///   append-only journal
pub trait Datastore: Send + Sync {
    /// Writes an entity, assigning an identifier if its key is incomplete.
    ///
    /// Returns the complete key under which the entity was stored.
    ///
    /// # Errors
    ///
    /// Fails with a codec error for a malformed key, or
    /// [`crate::StoreError::Unavailable`] if the backend cannot be
    /// reached.
    fn put(&self, ns: &Namespace, entity: Entity) -> StoreResult<Key>;

    /// Reads the entity stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StoreError::Unavailable`] if the backend
    /// cannot be reached. A missing entity is not an error.
    fn get(&self, ns: &Namespace, key: &Key) -> StoreResult<Option<Entity>>;

    /// Deletes the entity stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StoreError::Unavailable`] if the backend
    /// cannot be reached. Deleting an absent key is not an error.
    fn delete(&self, ns: &Namespace, key: &Key) -> StoreResult<()>;

    /// Executes a native query and returns one page of results.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StoreError::InvalidQuery`] for a filter/order
    /// combination the engine cannot answer, or for a cursor that does
    /// not match the query's shape.
    fn run_query(&self, ns: &Namespace, query: &NativeQuery) -> StoreResult<QueryResponse>;
}
