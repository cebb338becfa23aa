pub mod aggregator;
pub mod constants;
mod error;
pub mod export;
pub mod feed;
pub mod metric;
pub mod processor;
pub mod server;
pub mod settings;
pub mod smoother;
pub mod snapshot;
pub mod staleness;

pub use error::{Error, Result};

/// Monotonic clock shared by every stage. Reads through tokio so paused-time
/// tests move it forward.
pub fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}
