//! The capability set shared by read and write handles

use crate::client::{Bucket, ClientHandle};
use crate::{Context, FileConfig, ObjectLocation, ReadHandle, Result, SeekPolicy, WriteHandle};
use std::io::{self, SeekFrom};
use tracing::debug;

/// A blob opened as a file.
///
/// Implemented by [`ReadHandle`] and [`WriteHandle`]. Both report seeks
/// according to their [`SeekPolicy`] and never reposition the stream.
pub trait BlobFile: io::Seek {
    /// Project, bucket and object path of this file
    fn location(&self) -> &ObjectLocation;

    /// Whether closing this file also closes its storage client
    fn owns_client(&self) -> bool;

    /// Open another object of the same bucket for reading.
    ///
    /// The new handle shares this file's client and context and never
    /// closes the client.
    fn open(&self, path: &str) -> Result<ReadHandle>;

    /// Create another object of the same bucket for writing.
    ///
    /// The new handle shares this file's client and context and never
    /// closes the client.
    fn create(&self, path: &str) -> Result<WriteHandle>;

    /// Release the stream, then the client if this file owns it.
    ///
    /// Stops at the first failure: when the stream fails to close, an owned
    /// client is left unclosed.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// State common to both handle kinds
#[derive(Debug)]
pub(crate) struct HandleCore {
    pub ctx: Context,
    pub location: ObjectLocation,
    pub client: ClientHandle,
    pub bucket: Bucket,
    pub config: FileConfig,
}

impl HandleCore {
    /// Resolve the bucket of `location` through `client`
    pub fn resolve(
        ctx: &Context,
        client: ClientHandle,
        location: ObjectLocation,
        config: FileConfig,
    ) -> Result<Self> {
        let bucket = client.client().bucket(location.bucket())?;
        Ok(HandleCore {
            ctx: ctx.clone(),
            location,
            client,
            bucket,
            config,
        })
    }

    /// Same bucket and context, different object, borrowed client
    pub fn sibling(&self, path: &str) -> Result<Self> {
        Ok(HandleCore {
            ctx: self.ctx.clone(),
            location: self.location.sibling(path)?,
            client: ClientHandle::Borrowed(self.client.client().share()),
            bucket: self.bucket.clone(),
            config: self.config.clone(),
        })
    }

    pub fn seek(&self, pos: SeekFrom) -> io::Result<u64> {
        match self.config.seek {
            SeekPolicy::Ignore => {
                debug!("Ignoring seek to {:?} on {}", pos, self.location);
                Ok(0)
            }
            SeekPolicy::Reject => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} is a sequential object stream and cannot seek", self.location),
            )),
        }
    }
}
