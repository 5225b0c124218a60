use crate::database::Database;
use crate::database_config::DatabaseConfig;
use crate::errors::{IndexError, IndexResult};
use crate::store::{MemoryRecordStore, RecordStore, RecordStoreProvider};

/// Builder for configuring and opening a [`Database`].
///
/// Setters never fail on their own; the first error any of them hits is
/// kept and returned from [`open`](Self::open).
///
/// # Examples
///
/// ```rust,ignore
/// let db = Database::builder()
///     .ignore_null_values(false)
///     .progress_step(10_000)
///     .open()?;
/// ```
pub struct DatabaseBuilder {
    error: Option<IndexError>,
    config: DatabaseConfig,
    store: Option<RecordStore>,
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseBuilder {
    /// Creates a builder with default settings and an in-memory store.
    pub fn new() -> Self {
        DatabaseBuilder {
            error: None,
            config: DatabaseConfig::new(),
            store: None,
        }
    }

    /// Whether records with a null indexed field are kept out of indexes.
    pub fn ignore_null_values(mut self, ignore: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_ignore_null_values(ignore) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Records indexed between two progress callbacks of a bulk build.
    ///
    /// # Arguments
    /// * `step` - A positive record count
    pub fn progress_step(mut self, step: usize) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_progress_step(step) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Number of key-bucket latches per unique index.
    pub fn latch_stripes(mut self, stripes: usize) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_latch_stripes(stripes) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Replaces the default in-memory record store.
    pub fn record_store<T: RecordStoreProvider + 'static>(mut self, store: T) -> Self {
        self.store = Some(RecordStore::new(store));
        self
    }

    /// Opens the database, freezing its configuration.
    ///
    /// # Errors
    /// The first error recorded by a setter.
    pub fn open(self) -> IndexResult<Database> {
        if let Some(error) = self.error {
            log::error!("Database configuration failed: {}", error);
            return Err(error);
        }
        self.config.freeze();
        let store = self
            .store
            .unwrap_or_else(|| RecordStore::new(MemoryRecordStore::new()));
        log::debug!(
            "Opening database with progress step {} and {} latch stripes",
            self.config.progress_step(),
            self.config.latch_stripes()
        );
        Ok(Database::new(self.config, store))
    }
}
