//! Tenant scope tracking.
//!
//! ArborDB has no process-global tenant state. Each [`crate::Repository`]
//! owns one `NamespaceStack` - one stack per logical execution context -
//! and every public entry point pushes the namespace derived from the
//! target kind before touching the store. The pop happens in a guard's
//! `Drop`, so release is guaranteed on every exit path, including errors:
//! a leaked namespace after a failed call would make later unrelated calls
//! silently operate in the wrong tenant.

use arbordb_store::Namespace;
use parking_lot::Mutex;

/// A stack of active tenant namespaces for one execution context.
#[derive(Debug, Default)]
pub struct NamespaceStack {
    stack: Mutex<Vec<Namespace>>,
}

impl NamespaceStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `namespace` and returns a guard that pops it on drop.
    ///
    /// Scopes nest: a child-collection query entered while a parent
    /// lookup's scope is active restores the parent's namespace when the
    /// inner guard drops.
    pub fn enter(&self, namespace: Namespace) -> NamespaceGuard<'_> {
        self.stack.lock().push(namespace.clone());
        NamespaceGuard {
            stack: self,
            namespace,
        }
    }

    /// Returns the currently active namespace, if any.
    #[must_use]
    pub fn active(&self) -> Option<Namespace> {
        self.stack.lock().last().cloned()
    }

    /// Returns the current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }
}

/// Scope guard holding one entered namespace.
///
/// Dropping the guard restores the previously active namespace.
#[derive(Debug)]
pub struct NamespaceGuard<'a> {
    stack: &'a NamespaceStack,
    namespace: Namespace,
}

impl NamespaceGuard<'_> {
    /// Returns the namespace this guard holds active.
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

impl Drop for NamespaceGuard<'_> {
    fn drop(&mut self) {
        self.stack.stack.lock().pop();
    }
}
