/// Counters describing how a `Loader` has been used. Only collected with the `stats` feature.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoaderStats {
    /// Human readable name used to identify these stats when they are reported.
    tag: &'static str,
    /// Number of keys passed to `load_thunk` (not necessarily unique).
    load_requests: u64,
    /// The number of keys that were immediately found in the loader cache.
    cache_hits: u64,
    /// Number of batches handed to the batch function.
    batches: u64,
    /// Number of batches whose fetch failed as a whole (shared error or panic).
    failed_batches: u64,
    /// Number of batches whose batch function panicked. Also counted in `failed_batches`.
    panics: u64,
    /// The total number of distinct keys passed to the batch function.
    keys_fetched: u64,
    /// The total number of keys that resolved to a value.
    items_loaded: u64,
    /// The max number of keys fetched in a single batch.
    max_batch_size: usize,
    /// The min number of keys fetched in a single batch, `usize::MAX` until a batch ran.
    min_batch_size: usize,
}

impl LoaderStats {
    pub(crate) fn new(tag: &'static str) -> Self {
        Self { tag, min_batch_size: usize::MAX, ..Default::default() }
    }

    pub(crate) fn record_load_request(&mut self) {
        self.load_requests += 1;
    }

    pub(crate) fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub(crate) fn record_batch(
        &mut self,
        batch_size: usize,
        loaded: usize,
        failed: bool,
        panicked: bool,
    ) {
        self.batches += 1;
        self.keys_fetched += batch_size as u64;
        self.items_loaded += loaded as u64;
        if failed {
            self.failed_batches += 1;
        }
        if panicked {
            self.panics += 1;
        }
        self.max_batch_size = self.max_batch_size.max(batch_size);
        self.min_batch_size = self.min_batch_size.min(batch_size);
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn load_requests(&self) -> u64 {
        self.load_requests
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn failed_batches(&self) -> u64 {
        self.failed_batches
    }

    pub fn panics(&self) -> u64 {
        self.panics
    }

    pub fn keys_fetched(&self) -> u64 {
        self.keys_fetched
    }

    pub fn items_loaded(&self) -> u64 {
        self.items_loaded
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Smallest batch dispatched so far, `None` before the first batch.
    pub fn min_batch_size(&self) -> Option<usize> {
        (self.batches > 0).then_some(self.min_batch_size)
    }

    /// Mean number of keys per dispatched batch.
    pub fn average_batch_size(&self) -> f64 {
        if self.batches == 0 {
            return 0.0;
        }
        self.keys_fetched as f64 / self.batches as f64
    }
}
