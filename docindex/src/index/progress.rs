use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::IndexResult;

/// A bulk index build milestone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The build is about to index `total` existing records.
    Begin { index_name: String, total: usize },
    /// `done` of `total` records have been indexed.
    Progress {
        index_name: String,
        done: usize,
        total: usize,
    },
    /// The build finished; `success` is false when it was rolled back.
    Completion { index_name: String, success: bool },
}

/// Receives progress of a bulk index build.
///
/// An error returned from a callback aborts the build and drops the
/// half-built index.
pub trait ProgressListener: Send + Sync {
    fn on_begin(&self, index_name: &str, total: usize) -> IndexResult<()>;

    fn on_progress(&self, index_name: &str, done: usize, total: usize) -> IndexResult<()>;

    fn on_completion(&self, index_name: &str, success: bool) -> IndexResult<()>;
}

/// Callback signature of [`ProgressCallback`].
pub trait ProgressFn: Fn(ProgressEvent) -> IndexResult<()> + Send + Sync {}

impl<F> ProgressFn for F where F: Fn(ProgressEvent) -> IndexResult<()> + Send + Sync {}

/// A [`ProgressListener`] backed by a single closure.
///
/// # Examples
///
/// ```rust,ignore
/// let listener = ProgressCallback::new(|event| {
///     println!("{:?}", event);
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct ProgressCallback {
    on_event: Arc<dyn ProgressFn>,
}

impl ProgressCallback {
    pub fn new(on_event: impl ProgressFn + 'static) -> Self {
        ProgressCallback {
            on_event: Arc::new(on_event),
        }
    }
}

impl ProgressListener for ProgressCallback {
    fn on_begin(&self, index_name: &str, total: usize) -> IndexResult<()> {
        (self.on_event)(ProgressEvent::Begin {
            index_name: index_name.to_string(),
            total,
        })
    }

    fn on_progress(&self, index_name: &str, done: usize, total: usize) -> IndexResult<()> {
        (self.on_event)(ProgressEvent::Progress {
            index_name: index_name.to_string(),
            done,
            total,
        })
    }

    fn on_completion(&self, index_name: &str, success: bool) -> IndexResult<()> {
        (self.on_event)(ProgressEvent::Completion {
            index_name: index_name.to_string(),
            success,
        })
    }
}

impl Debug for ProgressCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressCallback").finish()
    }
}

/// Listener that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn on_begin(&self, _index_name: &str, _total: usize) -> IndexResult<()> {
        Ok(())
    }

    fn on_progress(&self, _index_name: &str, _done: usize, _total: usize) -> IndexResult<()> {
        Ok(())
    }

    fn on_completion(&self, _index_name: &str, _success: bool) -> IndexResult<()> {
        Ok(())
    }
}
