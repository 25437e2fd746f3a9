use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::LoadError;

/// Converts a panic payload caught while fetching into the error every waiter receives.
pub type PanicHandler = Arc<dyn Fn(Box<dyn Any + Send>) -> LoadError + Send + Sync>;

/// Construction-time settings of a `Loader`. Immutable once the loader is built.
#[derive(Clone)]
pub struct LoaderConfig {
    pub(crate) wait: Duration,
    pub(crate) max_batch: usize,
    pub(crate) on_panic: Option<PanicHandler>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { wait: Duration::from_millis(1), max_batch: 0, on_panic: None }
    }
}

impl fmt::Debug for LoaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderConfig")
            .field("wait", &self.wait)
            .field("max_batch", &self.max_batch)
            .field("on_panic", &self.on_panic.is_some())
            .finish()
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long a batch collects keys after its first key arrives, the default is `1ms`.
    #[must_use]
    pub fn wait(self, wait: Duration) -> Self {
        Self { wait, ..self }
    }

    /// Maximum number of distinct keys per batch, `0` (the default) means unbounded.
    ///
    /// A batch that reaches this size is dispatched immediately.
    #[must_use]
    pub fn max_batch(self, max_batch: usize) -> Self {
        Self { max_batch, ..self }
    }

    /// Sets the handler that turns a panic in the batch function into an error.
    ///
    /// Without a handler, waiters receive [`LoadError::Panicked`].
    #[must_use]
    pub fn on_panic<H>(self, handler: H) -> Self
    where
        H: Fn(Box<dyn Any + Send>) -> LoadError + Send + Sync + 'static,
    {
        Self { on_panic: Some(Arc::new(handler)), ..self }
    }

    pub(crate) fn panic_error(&self, payload: Box<dyn Any + Send>) -> LoadError {
        match &self.on_panic {
            Some(handler) => handler(payload),
            None => LoadError::from_panic(payload),
        }
    }

    /// Whether a batch holding `len` keys must close.
    pub(crate) fn is_full(&self, len: usize) -> bool {
        self.max_batch != 0 && len >= self.max_batch
    }
}
