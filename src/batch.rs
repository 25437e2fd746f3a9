use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{batch_function::BatchOutput, config::LoaderConfig};

/// Type-erased batch function bound to its context.
pub(crate) type FetchFn<K, V> =
    Box<dyn Fn(Vec<K>) -> BoxFuture<'static, BatchOutput<V>> + Send + Sync>;

/// Completion gate shared by every caller waiting on one batch. Resolves exactly once.
pub(crate) type Gate<V> = Shared<oneshot::Receiver<Arc<BatchOutput<V>>>>;

/// One collection window of a `Loader`.
///
/// A `Batch` is `Open` while it sits in the loader's batch slot, where callers append keys under
/// the loader lock. Taking it out of the slot commits it to closing: whoever took it (the window
/// timer or the caller that filled it) is the only one that can call [`Batch::resolve`], which
/// consumes it. Once resolved the gate has fired and the batch is gone.
pub(crate) struct Batch<K, V> {
    id: u64,
    keys: Vec<K>,
    done: oneshot::Sender<Arc<BatchOutput<V>>>,
    gate: Gate<V>,
    timer: Option<JoinHandle<()>>,
}

impl<K, V> Batch<K, V>
where
    K: PartialEq + Clone,
{
    pub(crate) fn new(id: u64) -> Self {
        let (done, rx) = oneshot::channel();
        Self { id, keys: Vec::new(), done, gate: rx.shared(), timer: None }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn gate(&self) -> Gate<V> {
        self.gate.clone()
    }

    /// Returns the position of `key` in this batch, appending it if it is not present yet.
    ///
    /// The flag is true when the key was appended. Batches are bounded by the configured max size,
    /// so a linear scan is enough.
    pub(crate) fn key_index(&mut self, key: &K) -> (usize, bool) {
        if let Some(pos) = self.keys.iter().position(|existing| existing == key) {
            return (pos, false);
        }
        self.keys.push(key.clone());
        (self.keys.len() - 1, true)
    }

    pub(crate) fn set_timer(&mut self, timer: JoinHandle<()>) {
        self.timer = Some(timer);
    }

    /// Stops the window timer. Only valid when the batch closes for a reason other than the timer
    /// itself, since aborting the task that runs the fetch would cancel it.
    pub(crate) fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Runs the fetch for the collected keys and releases every waiter.
    ///
    /// A panic in the batch function becomes a whole-batch error, so the gate always fires. The
    /// flag is true when that happened.
    pub(crate) async fn resolve(
        self,
        fetch: &FetchFn<K, V>,
        config: &LoaderConfig,
    ) -> (Arc<BatchOutput<V>>, bool) {
        let Batch { id, keys, done, .. } = self;
        tracing::debug!(batch = id, keys = keys.len(), "dispatching batch");

        let fetched = AssertUnwindSafe(async move { fetch(keys).await }).catch_unwind();
        let (output, panicked) = match fetched.await {
            Ok(output) => (output, false),
            Err(payload) => {
                tracing::debug!(batch = id, "batch function panicked");
                (BatchOutput::All(config.panic_error(payload)), true)
            }
        };

        let output = Arc::new(output);
        if done.send(Arc::clone(&output)).is_err() {
            tracing::trace!(batch = id, "no callers left waiting on batch");
        }
        (output, panicked)
    }
}
