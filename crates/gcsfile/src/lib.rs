//! # gcsfile
//!
//! Google Cloud Storage objects as synchronous file sources and sinks. This
//! crate lets a columnar format library (Parquet, through the `parquet`
//! feature) read and write blobs through plain `std::io` traits without
//! dealing with async complexity.
//!
//! ## Architecture
//!
//! The main abstractions are:
//! - [`ReadHandle`]: a download stream, implementing `Read` and `Seek`
//! - [`WriteHandle`]: an upload stream, implementing `Write` and `Seek`
//! - [`BlobFile`]: the capability set both handles share
//! - [`StorageClient`]: the connection, owned by a handle or shared by the caller
//!
//! Handles drive the async `object_store` client on the client's own Tokio
//! runtime. Every network call honours the [`Context`] the handle was opened
//! with. Seeking is not supported by object streams; see [`SeekPolicy`].
//!
//! ```no_run
//! use gcsfile::{BlobFile, Context};
//! use std::io::{Read, Write};
//!
//! # fn main() -> gcsfile::Result<()> {
//! let ctx = Context::background();
//! let mut writer = gcsfile::open_writer(&ctx, "my-project", "my-bucket", "out/data.bin")?;
//! writer.write_all(b"payload")?;
//! writer.close()?;
//!
//! let mut reader = gcsfile::open_reader(&ctx, "my-project", "my-bucket", "out/data.bin")?;
//! let mut data = Vec::new();
//! reader.read_to_end(&mut data)?;
//! reader.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_debug_implementations)]

mod buffer;
mod client;
mod config;
mod context;
mod error;
mod file;
mod location;
mod reader;
mod runtime;
mod writer;

#[cfg(feature = "parquet")]
pub mod columnar;

pub use client::{Bucket, GcsProvider, ObjectHandle, StaticProvider, StorageClient, StoreProvider};
pub use config::{ClientOptions, FileConfig, GcsConfig, SeekPolicy};
pub use context::Context;
pub use error::{CloudError, Result};
pub use file::BlobFile;
pub use location::ObjectLocation;
pub use reader::{ObjectReader, ReadHandle, ReadOutcome, ReadStop};
pub use writer::{ObjectWriter, WriteHandle};

// Re-export commonly used types from object_store
pub use object_store::{path::Path as ObjectPath, DynObjectStore, ObjectStore};

/// Create `path` in `bucket` with a client built from the environment.
///
/// The bucket must already exist. Closing the handle closes the client.
pub fn open_writer(ctx: &Context, project: &str, bucket: &str, path: &str) -> Result<WriteHandle> {
    let location = ObjectLocation::new(project, bucket, path)?;
    let client = StorageClient::connect(ctx, project, ClientOptions::default())?;
    WriteHandle::create_owned(ctx, client, location, FileConfig::default())
}

/// Create `path` in `bucket` with the caller's client, which stays open
/// after the handle is closed.
pub fn open_writer_with_client(
    ctx: &Context,
    client: &StorageClient,
    project: &str,
    bucket: &str,
    path: &str,
) -> Result<WriteHandle> {
    let location = ObjectLocation::new(project, bucket, path)?;
    WriteHandle::create_shared(ctx, client, location, FileConfig::default())
}

/// Open `path` in `bucket` for reading with a client built from the
/// environment.
///
/// Fails with the client's error when the object is missing or not
/// accessible. Closing the handle closes the client.
pub fn open_reader(ctx: &Context, project: &str, bucket: &str, path: &str) -> Result<ReadHandle> {
    let location = ObjectLocation::new(project, bucket, path)?;
    let client = StorageClient::connect(ctx, project, ClientOptions::default())?;
    ReadHandle::open_owned(ctx, client, location, FileConfig::default())
}

/// Open `path` in `bucket` for reading with the caller's client, which stays
/// open after the handle is closed.
pub fn open_reader_with_client(
    ctx: &Context,
    client: &StorageClient,
    project: &str,
    bucket: &str,
    path: &str,
) -> Result<ReadHandle> {
    let location = ObjectLocation::new(project, bucket, path)?;
    ReadHandle::open_shared(ctx, client, location, FileConfig::default())
}
