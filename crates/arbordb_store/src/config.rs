//! Store configuration.

/// Configuration for durable stores.
///
/// # Example
///
/// ```
/// use arbordb_store::StoreConfig;
///
/// let config = StoreConfig::default()
///     .create_if_missing(true)
///     .sync_on_write(false);
/// assert!(!config.sync_on_write);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Create the store directory if it doesn't exist.
    pub create_if_missing: bool,
    /// Sync the journal to durable storage after every write.
    ///
    /// Disabling trades durability of the most recent writes for
    /// throughput.
    pub sync_on_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
        }
    }
}

impl StoreConfig {
    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the journal after every write.
    #[must_use]
    pub fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}
