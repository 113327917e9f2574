//! Tokio runtime management for synchronous operations

use crate::{ClientOptions, CloudError, Result};
use tokio::runtime::Runtime;

/// Build the runtime a storage client uses to drive its async calls
pub(crate) fn build_runtime(options: &ClientOptions) -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(options.worker_threads.max(1))
        .enable_all()
        .thread_name("gcsfile-worker")
        .build()
        .map_err(|e| CloudError::Runtime(format!("Failed to create Tokio runtime: {}", e)))
}
