//! Configuration of a [`Database`](crate::Database) instance.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::common::{DEFAULT_LATCH_STRIPES, DEFAULT_PROGRESS_STEP};
use crate::errors::{ErrorKind, IndexError, IndexResult};

/// Tunables shared by the catalog, the index writer and the planner.
///
/// Values can be changed until the database is opened; afterwards the
/// configuration is frozen.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Database::builder()
///     .ignore_null_values(false)
///     .progress_step(500)
///     .open()?;
/// ```
#[derive(Clone)]
pub struct DatabaseConfig {
    inner: Arc<DatabaseConfigInner>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseConfig {
    pub fn new() -> Self {
        DatabaseConfig {
            inner: Arc::new(DatabaseConfigInner::new()),
        }
    }

    /// Whether records with a null or missing indexed field are left out
    /// of that index. Defaults to `true`.
    pub fn ignore_null_values(&self) -> bool {
        self.inner.ignore_null_values.load(Ordering::Relaxed)
    }

    pub fn set_ignore_null_values(&self, ignore: bool) -> IndexResult<()> {
        self.inner.check_mutable()?;
        self.inner.ignore_null_values.store(ignore, Ordering::Relaxed);
        Ok(())
    }

    /// Records indexed between two progress callbacks of a bulk build.
    pub fn progress_step(&self) -> usize {
        self.inner.progress_step.load(Ordering::Relaxed)
    }

    pub fn set_progress_step(&self, step: usize) -> IndexResult<()> {
        self.inner.check_mutable()?;
        if step == 0 {
            log::error!("Progress step must be positive");
            return Err(IndexError::new(
                "Progress step must be positive",
                ErrorKind::ValidationError,
            ));
        }
        self.inner.progress_step.store(step, Ordering::Relaxed);
        Ok(())
    }

    /// Number of key-bucket latches per unique index.
    pub fn latch_stripes(&self) -> usize {
        self.inner.latch_stripes.load(Ordering::Relaxed)
    }

    pub fn set_latch_stripes(&self, stripes: usize) -> IndexResult<()> {
        self.inner.check_mutable()?;
        if stripes == 0 {
            log::error!("Latch stripe count must be positive");
            return Err(IndexError::new(
                "Latch stripe count must be positive",
                ErrorKind::ValidationError,
            ));
        }
        self.inner.latch_stripes.store(stripes, Ordering::Relaxed);
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.load(Ordering::Relaxed)
    }

    pub(crate) fn freeze(&self) {
        self.inner.frozen.store(true, Ordering::Relaxed);
    }
}

struct DatabaseConfigInner {
    frozen: AtomicBool,
    ignore_null_values: AtomicBool,
    progress_step: AtomicUsize,
    latch_stripes: AtomicUsize,
}

impl DatabaseConfigInner {
    fn new() -> Self {
        DatabaseConfigInner {
            frozen: AtomicBool::new(false),
            ignore_null_values: AtomicBool::new(true),
            progress_step: AtomicUsize::new(DEFAULT_PROGRESS_STEP),
            latch_stripes: AtomicUsize::new(DEFAULT_LATCH_STRIPES),
        }
    }

    fn check_mutable(&self) -> IndexResult<()> {
        if self.frozen.load(Ordering::Relaxed) {
            log::error!("Configuration cannot be changed after the database is opened");
            return Err(IndexError::new(
                "Configuration cannot be changed after the database is opened",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
