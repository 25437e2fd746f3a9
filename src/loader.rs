use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};
use tokio::task::JoinHandle;
use tracing_futures::Instrument;

#[cfg(feature = "stats")]
use crate::loader_stats::LoaderStats;
use crate::{
    batch::{Batch, FetchFn},
    batch_function::BatchFunction,
    cache::Cache,
    config::LoaderConfig,
    error::LoadError,
};

/// Deferred result of [`Loader::load_thunk`].
pub type Thunk<V> = BoxFuture<'static, Result<V, LoadError>>;

/// Deferred results of [`Loader::load_all_thunk`], in the order the keys were given.
pub type AllThunk<V> = BoxFuture<'static, Vec<Result<V, LoadError>>>;

/// Batch loads values from some expensive resource, primarily intended for mitigating GraphQL's
/// N+1 problem.
///
/// Users can call [`Loader::load`] and [`Loader::load_all`] to fetch values from the underlying
/// resource or cache. Keys requested while a batch window is open are collected into that batch
/// (duplicates share one slot) and handed to the [`BatchFunction`] in a single call once the
/// window elapses or the batch reaches its maximum size. The cache can be cleared with calls to
/// [`Loader::clear`] and [`Loader::clear_many`], and values can be added to the cache out-of-band
/// through the use of [`Loader::prime`] and [`Loader::prime_many`].
///
/// A single lock guards the cache and the open batch. It is only held for index assignment,
/// cache reads and writes and batch hand-off; the fetch itself and the wait for its result happen
/// outside of it.
///
/// Loading requires a running tokio runtime, since each batch runs its window timer and fetch on a
/// spawned task.
pub struct Loader<K, V, C = HashMap<K, V>>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Sync + Clone,
    C: 'static + Cache<K = K, V = V> + Send,
{
    shared: Arc<Shared<K, V, C>>,
}

struct Shared<K, V, C> {
    state: Mutex<State<K, V, C>>,
    fetch: FetchFn<K, V>,
    config: LoaderConfig,
}

struct State<K, V, C> {
    cache: C,
    /// The open batch. Keys keep being collected into it until it is taken out to resolve.
    batch: Option<Batch<K, V>>,
    next_batch_id: u64,
    #[cfg(feature = "stats")]
    stats: LoaderStats,
}

impl<K, V> Loader<K, V>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Sync + Clone,
{
    /// Creates a new Loader for the provided BatchFunction and Context type with the default
    /// configuration.
    ///
    /// Note: the batch function is passed in as a marker for type inference.
    pub fn new<F, ContextT>(batch_fn: F, context: ContextT) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    {
        Self::with_config(batch_fn, context, LoaderConfig::default())
    }

    /// Creates a new Loader with an explicit configuration.
    pub fn with_config<F, ContextT>(batch_fn: F, context: ContextT, config: LoaderConfig) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    {
        Self::with_cache(batch_fn, context, config, HashMap::new())
    }
}

impl<K, V, C> Loader<K, V, C>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Sync + Clone,
    C: 'static + Cache<K = K, V = V> + Send,
{
    /// Creates a new Loader backed by a caller-provided cache.
    pub fn with_cache<F, ContextT>(_: F, context: ContextT, config: LoaderConfig, cache: C) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    {
        let context = Arc::new(context);
        let fetch: FetchFn<K, V> = Box::new(move |keys: Vec<K>| {
            let context = Arc::clone(&context);
            async move { F::load(&keys, &context).await }.boxed()
        });
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    cache,
                    batch: None,
                    next_batch_id: 0,
                    #[cfg(feature = "stats")]
                    stats: LoaderStats::new(std::any::type_name::<(K, V)>()),
                }),
                fetch,
                config,
            }),
        }
    }

    /// Loads a value from the underlying resource, or from the cache if it was loaded before.
    ///
    /// Equivalent to awaiting [`Loader::load_thunk`] right away.
    pub async fn load(&self, key: K) -> Result<V, LoadError> {
        self.load_thunk(key).await
    }

    /// Enqueues `key` for loading and returns a future resolving to its value.
    ///
    /// The key joins the open batch before this returns, so callers can enqueue keys on many
    /// loaders before awaiting any of them. A cached key resolves immediately without touching a
    /// batch. A successful result is written to the cache when the thunk is awaited; errors are
    /// never cached, so a later load retries.
    ///
    /// # Panics
    ///
    /// Panics if the key is not cached and this is called outside of a tokio runtime, since the
    /// batch window timer is spawned on the current runtime.
    pub fn load_thunk(&self, key: K) -> Thunk<V> {
        let (gate, pos) = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            #[cfg(feature = "stats")]
            state.stats.record_load_request();

            if let Some(value) = state.cache.get(&key) {
                tracing::trace!(?key, "cache hit");
                let value = value.clone();
                #[cfg(feature = "stats")]
                state.stats.record_cache_hit();
                return future::ready(Ok(value)).boxed();
            }

            let next_batch_id = &mut state.next_batch_id;
            let batch = state.batch.get_or_insert_with(|| {
                let id = *next_batch_id;
                *next_batch_id += 1;
                Batch::new(id)
            });

            let (pos, inserted) = batch.key_index(&key);
            if inserted && pos == 0 {
                tracing::trace!(batch = batch.id(), "opened batch");
                batch.set_timer(self.shared.start_timer(batch.id()));
            }
            let gate = batch.gate();

            if inserted && self.shared.config.is_full(batch.len()) {
                if let Some(mut full) = state.batch.take() {
                    full.cancel_timer();
                    tracing::trace!(batch = full.id(), "batch reached max size");
                    let shared = Arc::clone(&self.shared);
                    let span = tracing::debug_span!("batch", id = full.id(), trigger = "size");
                    tokio::spawn(async move { shared.dispatch(full).await }.instrument(span));
                }
            }
            (gate, pos)
        };

        let shared = Arc::clone(&self.shared);
        async move {
            let output = gate.await.map_err(|_| LoadError::Canceled)?;
            let value = output.get(pos)?;
            shared.lock().cache.insert(key, value.clone());
            Ok(value)
        }
        .boxed()
    }

    /// Loads many values at once, preserving the order of `keys` including duplicates.
    ///
    /// Keys may be spread over several batches depending on the configured max batch size.
    pub async fn load_all<I>(&self, keys: I) -> Vec<Result<V, LoadError>>
    where
        I: IntoIterator<Item = K>,
    {
        self.load_all_thunk(keys).await
    }

    /// Enqueues every key and returns a future resolving to all of their results, in order.
    pub fn load_all_thunk<I>(&self, keys: I) -> AllThunk<V>
    where
        I: IntoIterator<Item = K>,
    {
        let thunks = keys.into_iter().map(|key| self.load_thunk(key)).collect::<Vec<_>>();
        future::join_all(thunks).boxed()
    }

    /// Adds a value to the cache if the key is not cached yet.
    ///
    /// Returns false, leaving the cached value untouched, if the key was already present. To
    /// forcefully prime a key, [`Loader::clear`] it first.
    pub fn prime(&self, key: K, value: V) -> bool {
        self.shared.lock().cache.insert_if_absent(key, value)
    }

    /// Primes many values at once, returning for each pair whether it was written.
    pub fn prime_many<I>(&self, key_vals: I) -> Vec<bool>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut state = self.shared.lock();
        key_vals.into_iter().map(|(key, value)| state.cache.insert_if_absent(key, value)).collect()
    }

    /// Removes a value from the cache.
    ///
    /// This key will be reloaded when it is next requested.
    pub fn clear(&self, key: &K) {
        self.shared.lock().cache.remove(key);
    }

    /// Removes multiple values from the cache at once.
    ///
    /// These keys will be reloaded when requested.
    pub fn clear_many<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a K>,
    {
        let mut state = self.shared.lock();
        for key in keys {
            state.cache.remove(key);
        }
    }

    /// Removes every value from the cache.
    pub fn clear_all(&self) {
        self.shared.lock().cache.flush();
    }

    /// Snapshot of the counters collected so far.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> LoaderStats {
        self.shared.lock().stats.clone()
    }
}

#[cfg(feature = "stats")]
impl<K, V, C> Drop for Loader<K, V, C>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Sync + Clone,
    C: 'static + Cache<K = K, V = V> + Send,
{
    fn drop(&mut self) {
        let state = self.shared.lock();
        tracing::debug!(loader_stats = ?state.stats);
    }
}

impl<K, V, C> Shared<K, V, C>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Sync + Clone,
    C: 'static + Cache<K = K, V = V> + Send,
{
    fn lock(&self) -> MutexGuard<'_, State<K, V, C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the window timer of the batch `id`. When it elapses the batch is taken out of the
    /// slot and resolved, unless it already closed because it reached the max size.
    fn start_timer(self: &Arc<Self>, id: u64) -> JoinHandle<()> {
        let shared = Arc::clone(self);
        let span = tracing::debug_span!("batch", id, trigger = "wait");
        tokio::spawn(
            async move {
                tokio::time::sleep(shared.config.wait).await;
                let expired = {
                    let mut state = shared.lock();
                    if state.batch.as_ref().map(Batch::id) == Some(id) {
                        state.batch.take()
                    } else {
                        None
                    }
                };
                if let Some(batch) = expired {
                    shared.dispatch(batch).await;
                }
            }
            .instrument(span),
        )
    }

    async fn dispatch(&self, batch: Batch<K, V>) {
        let size = batch.len();
        let (output, panicked) = batch.resolve(&self.fetch, &self.config).await;
        tracing::debug!(keys = size, failed = output.is_failed(), panicked, "batch resolved");

        #[cfg(feature = "stats")]
        self.lock().stats.record_batch(size, output.loaded(), output.is_failed(), panicked);
    }
}
