mod batch;
mod batch_function;
mod cache;
mod config;
mod error;
mod loader;
#[cfg(feature = "stats")]
mod loader_stats;

pub use batch_function::{BatchFunction, BatchOutput};
pub use cache::Cache;
pub use config::{LoaderConfig, PanicHandler};
pub use error::LoadError;
pub use loader::{AllThunk, Loader, Thunk};
#[cfg(feature = "stats")]
pub use loader_stats::LoaderStats;
