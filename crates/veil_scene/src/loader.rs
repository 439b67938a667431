//! Cancellable asset loading
//!
//! Texture and model fetches run outside the frame loop and publish their
//! results for the next frame to pick up. The hazard is an async resolve
//! landing after the requesting element unmounted: a [`PendingLoad`] carries
//! a cancellation flag that is checked before the result is committed, so a
//! late resolve mutates nothing and the fallback state simply stays visible.
//!
//! Load failures are logged at `warn` and the requester keeps its
//! placeholder; there is no automatic retry.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error produced while fetching or decoding an asset
#[derive(Debug)]
pub enum LoadError {
    /// Asset not found at its source
    NotFound(String),
    /// Transport error
    Io(std::io::Error),
    /// Fetched bytes could not be decoded
    Decode(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound(source) => write!(f, "Asset not found: {}", source),
            LoadError::Io(err) => write!(f, "IO error: {}", err),
            LoadError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound(err.to_string())
        } else {
            LoadError::Io(err)
        }
    }
}

/// Handle an unmounting element uses to cancel its in-flight load
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// An in-flight asset load awaiting its result
///
/// The host starts a load with [`PendingLoad::new`], hands the
/// [`CancelHandle`] to the requesting element's teardown, performs the
/// fetch/decode however it likes, and calls [`resolve`](Self::resolve) when
/// done. Commit happens only if the load was not cancelled in the meantime.
pub struct PendingLoad<T> {
    source: String,
    cancelled: Arc<AtomicBool>,
    on_commit: Box<dyn FnOnce(T) + Send>,
}

impl<T> PendingLoad<T> {
    pub fn new<F>(source: impl Into<String>, on_commit: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        Self {
            source: source.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
            on_commit: Box::new(on_commit),
        }
    }

    /// Handle for cancelling this load from the element's teardown path
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: self.cancelled.clone(),
        }
    }

    /// Deliver the load result
    ///
    /// The cancellation flag is checked first: a cancelled load commits
    /// nothing regardless of outcome. A failed load also commits nothing:
    /// the requester falls back to its placeholder and no retry is
    /// scheduled.
    pub fn resolve(self, result: Result<T, LoadError>) {
        if self.cancelled.load(Ordering::SeqCst) {
            tracing::trace!(source = %self.source, "dropping result of cancelled load");
            return;
        }
        match result {
            Ok(value) => (self.on_commit)(value),
            Err(err) => {
                tracing::warn!(source = %self.source, error = %err, "asset load failed; keeping placeholder");
            }
        }
    }
}
