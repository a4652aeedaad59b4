//! # ArborDB Store
//!
//! Storage engine trait and implementations for ArborDB.
//!
//! This crate provides:
//! - [`Datastore`] - the entity storage contract: put/get/delete and
//!   ancestor-aware, cursor-resumable query execution
//! - [`MemoryDatastore`] - the in-memory engine and semantics reference
//! - [`JournalDatastore`] - a durable engine backed by an append-only,
//!   replay-on-open journal with single-process locking
//! - [`NativeQuery`] and friends - the query representation the engines
//!   execute
//!
//! Engines are namespace-explicit: every operation names the tenant
//! partition it targets, and no ambient tenant state exists at this
//! layer. The scope machinery that derives and pushes namespaces lives in
//! `arbordb_core`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod datastore;
mod error;
mod journal;
mod memory;
mod query;

pub use config::StoreConfig;
pub use datastore::{Datastore, Namespace};
pub use error::{StoreError, StoreResult};
pub use journal::JournalDatastore;
pub use memory::MemoryDatastore;
pub use query::{
    Direction, FilterOperator, NativeQuery, PropertyFilter, PropertyOrder, QueryResponse,
};
