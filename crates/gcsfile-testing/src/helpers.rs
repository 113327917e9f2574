//! Helper utilities for gcsfile testing

use anyhow::Result;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber, honouring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn block_on<F: std::future::Future>(fut: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(fut))
}

/// Store `data` at `path`, bypassing the code under test
pub fn seed_object(store: &dyn ObjectStore, path: &str, data: &[u8]) -> Result<()> {
    let location = Path::from(path);
    block_on(store.put(&location, PutPayload::from(data.to_vec())))??;
    Ok(())
}

/// Fetch the full content at `path`, bypassing the code under test
pub fn read_object(store: &dyn ObjectStore, path: &str) -> Result<Vec<u8>> {
    let location = Path::from(path);
    let bytes = block_on(async { store.get(&location).await?.bytes().await })??;
    Ok(bytes.to_vec())
}
