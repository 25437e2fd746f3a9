use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Error returned to every caller waiting on a key that could not be loaded.
///
/// All waiters of a batch observe the same error value, so it is cheaply cloneable.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// The batch function reported a failure, either for one key or for the whole batch.
    #[error("fetch failed: {0}")]
    Fetch(Arc<dyn StdError + Send + Sync>),

    /// The batch function panicked and no panic handler was configured.
    #[error("panic in fetch: {0}")]
    Panicked(String),

    /// The batch function returned neither a value nor an error for the key.
    #[error("fetch returned no value for key")]
    Missing,

    /// The batch was dropped before it resolved, e.g. because the runtime shut down.
    #[error("batch was canceled before it resolved")]
    Canceled,
}

impl LoadError {
    /// Wraps an arbitrary error produced by a batch function.
    pub fn fetch<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        LoadError::Fetch(Arc::from(err.into()))
    }

    /// Shorthand for a fetch error carrying only a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::fetch(message.to_string())
    }

    /// Builds the default error for a panic payload caught while fetching.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_owned()
        };
        LoadError::Panicked(message)
    }
}
