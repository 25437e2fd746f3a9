use async_trait::async_trait;

use crate::error::LoadError;

/// A `BatchFunction` defines the method through which some `Loader` may fetch
/// batched data from some resource. The `BatchFunction` receives a slice of keys
/// collected during one batch window of the `Loader`, and some user defined context struct.
///
/// Keys are presented in first-request order with duplicates collapsed. The returned
/// [`BatchOutput`] is matched against them by position. The slice must not be retained beyond
/// the call.
///
/// Multiple `BatchFunctions` (and therefore loaders) can share the same context (likely through an
/// `Arc`).
#[async_trait]
pub trait BatchFunction<K, V> {
    type Context;
    async fn load(keys: &[K], context: &Self::Context) -> BatchOutput<V>;
}

/// Result of a single batch fetch.
#[derive(Debug)]
pub enum BatchOutput<V> {
    /// One result per key, index-aligned with the keys passed to the batch function.
    ///
    /// A key whose position is past the end of the vector resolves to [`LoadError::Missing`].
    Each(Vec<Result<V, LoadError>>),
    /// The whole batch failed; every key receives this error.
    All(LoadError),
}

impl<V> BatchOutput<V> {
    /// Builds an output from parallel value and error sequences.
    ///
    /// An `errors` sequence of exactly one element is applied to every key. Otherwise errors are
    /// matched by position and a `None` (or absent) entry means the key succeeded with the value
    /// at the same position.
    pub fn from_parts(values: Vec<V>, mut errors: Vec<Option<LoadError>>) -> Self {
        if errors.len() == 1 {
            if let Some(err) = errors.pop().flatten() {
                return BatchOutput::All(err);
            }
        }

        let mut errors = errors.into_iter();
        let mut results = values
            .into_iter()
            .map(|value| match errors.next().flatten() {
                Some(err) => Err(err),
                None => Ok(value),
            })
            .collect::<Vec<_>>();
        results.extend(errors.map(|err| Err(err.unwrap_or(LoadError::Missing))));
        BatchOutput::Each(results)
    }

    /// Resolves the outcome for the key at `pos`.
    pub(crate) fn get(&self, pos: usize) -> Result<V, LoadError>
    where
        V: Clone,
    {
        match self {
            BatchOutput::All(err) => Err(err.clone()),
            BatchOutput::Each(results) => match results.get(pos) {
                Some(result) => result.clone(),
                None => Err(LoadError::Missing),
            },
        }
    }

    /// Whether the whole batch failed with a shared error.
    pub(crate) fn is_failed(&self) -> bool {
        matches!(self, BatchOutput::All(_))
    }

    /// Number of keys that resolved to a value.
    #[cfg(feature = "stats")]
    pub(crate) fn loaded(&self) -> usize {
        match self {
            BatchOutput::All(_) => 0,
            BatchOutput::Each(results) => results.iter().filter(|r| r.is_ok()).count(),
        }
    }
}

impl<V> From<Vec<Result<V, LoadError>>> for BatchOutput<V> {
    fn from(results: Vec<Result<V, LoadError>>) -> Self {
        BatchOutput::Each(results)
    }
}

impl<V> From<LoadError> for BatchOutput<V> {
    fn from(err: LoadError) -> Self {
        BatchOutput::All(err)
    }
}
