//! # ArborDB Testkit
//!
//! Shared test utilities for the ArborDB workspace:
//!
//! - [`fixtures`] - sample [`arbordb_core::EntityModel`] types
//!   ([`Project`]/[`Task`]/[`Widget`]) and repository helpers with
//!   automatic cleanup
//! - [`generators`] - proptest strategies for values, keys, and entities
//!
//! This crate is a development dependency of the workspace's other
//! crates; it never ships in an application build.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    populate_widgets, with_repository, Project, Task, TestRepository, Widget,
};
