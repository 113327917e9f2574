//! Download streams and read handles

use crate::buffer::PendingChunk;
use crate::client::{Bucket, ClientHandle, ObjectHandle};
use crate::file::{BlobFile, HandleCore};
use crate::{CloudError, Context, FileConfig, ObjectLocation, Result, StorageClient, WriteHandle};
use bytes::Bytes;
use futures_util::stream::{BoxStream, Fuse};
use futures_util::StreamExt;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::{debug, trace};

/// Download stream of a single object.
///
/// Each [`read`](ObjectReader::read) pulls at most one chunk from the
/// network and may return fewer bytes than requested.
pub struct ObjectReader {
    object: ObjectHandle,
    ctx: Context,
    stream: Fuse<BoxStream<'static, object_store::Result<Bytes>>>,
    /// Unread part of the last chunk
    pending: PendingChunk,
    /// Total size of the object
    size: usize,
}

impl ObjectReader {
    pub(crate) fn open(object: ObjectHandle, ctx: Context) -> Result<Self> {
        let store = Arc::clone(object.bucket().store());
        let path = object.path().clone();
        let result = ctx.block_on(object.bucket().runtime(), async move { store.get(&path).await })?;

        let size = result.meta.size;
        debug!(
            "Opened download stream for {}/{} ({} bytes)",
            object.bucket().name(),
            object.path(),
            size
        );

        Ok(ObjectReader {
            object,
            ctx,
            stream: result.into_stream().fuse(),
            pending: PendingChunk::default(),
            size,
        })
    }

    /// Size of the object when the stream was opened
    pub fn size(&self) -> usize {
        self.size
    }

    /// Read from the stream. `Ok(0)` means the end of the object.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.pending.is_empty() {
            match self.next_chunk()? {
                Some(chunk) => self.pending.refill(chunk),
                None => return Ok(0),
            }
        }

        Ok(self.pending.drain_into(buf))
    }

    /// Pull the next non-empty chunk from the network
    fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            let stream = &mut self.stream;
            let chunk = self.ctx.block_on(self.object.bucket().runtime(), async move {
                stream.next().await.transpose()
            })?;

            match chunk {
                Some(chunk) if chunk.is_empty() => continue,
                Some(chunk) => {
                    trace!("Received {} bytes from {}", chunk.len(), self.object.path());
                    return Ok(Some(chunk));
                }
                None => return Ok(None),
            }
        }
    }

    /// Release the download stream
    pub fn close(self) -> Result<()> {
        debug!("Closing download stream for {}", self.object.path());
        Ok(())
    }
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("object", &self.object)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Why [`ReadHandle::read_full`] stopped before filling the buffer
#[derive(Debug)]
pub enum ReadStop {
    /// The object has no more data
    EndOfStream,
    /// The download stream failed
    Failed(CloudError),
}

/// Result of [`ReadHandle::read_full`]
#[derive(Debug)]
#[must_use]
pub struct ReadOutcome {
    /// Bytes placed at the start of the buffer
    pub len: usize,
    /// `None` when the buffer was filled
    pub stop: Option<ReadStop>,
}

impl ReadOutcome {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self.stop, Some(ReadStop::EndOfStream))
    }

    /// Turn a failure into an error, keeping the byte count otherwise
    pub fn into_result(self) -> Result<usize> {
        match self.stop {
            Some(ReadStop::Failed(err)) => Err(err),
            _ => Ok(self.len),
        }
    }
}

/// An object opened for reading
#[derive(Debug)]
pub struct ReadHandle {
    core: HandleCore,
    stream: ObjectReader,
    /// Error hit after a partial read, reported by the next `read`
    deferred: Option<CloudError>,
}

impl ReadHandle {
    /// Open `location` with a client this handle takes ownership of.
    /// Closing the handle closes the client.
    pub fn open_owned(
        ctx: &Context,
        client: StorageClient,
        location: ObjectLocation,
        config: FileConfig,
    ) -> Result<Self> {
        Self::open_with(ctx, ClientHandle::Owned(client), location, config)
    }

    /// Open `location` with a caller's client. Closing the handle leaves the
    /// client open.
    pub fn open_shared(
        ctx: &Context,
        client: &StorageClient,
        location: ObjectLocation,
        config: FileConfig,
    ) -> Result<Self> {
        Self::open_with(ctx, ClientHandle::Borrowed(client.share()), location, config)
    }

    pub(crate) fn open_with(
        ctx: &Context,
        client: ClientHandle,
        location: ObjectLocation,
        config: FileConfig,
    ) -> Result<Self> {
        Self::from_core(HandleCore::resolve(ctx, client, location, config)?)
    }

    pub(crate) fn from_core(core: HandleCore) -> Result<Self> {
        let stream = core
            .bucket
            .object_at(core.location.path().clone())
            .new_reader(&core.ctx)?;
        Ok(ReadHandle {
            core,
            stream,
            deferred: None,
        })
    }

    /// Fill `buf` from the download stream.
    ///
    /// Keeps pulling until the buffer is full or the stream stops, so short
    /// network reads never reach the caller.
    pub fn read_full(&mut self, buf: &mut [u8]) -> ReadOutcome {
        let mut len = 0;
        while len < buf.len() {
            match self.stream.read(&mut buf[len..]) {
                Ok(0) => {
                    return ReadOutcome {
                        len,
                        stop: Some(ReadStop::EndOfStream),
                    }
                }
                Ok(n) => len += n,
                Err(err) => {
                    return ReadOutcome {
                        len,
                        stop: Some(ReadStop::Failed(err)),
                    }
                }
            }
        }
        ReadOutcome { len, stop: None }
    }

    /// Size of the object when it was opened
    pub fn size(&self) -> usize {
        self.stream.size()
    }

    pub fn bucket(&self) -> &Bucket {
        &self.core.bucket
    }

    pub fn context(&self) -> &Context {
        &self.core.ctx
    }
}

impl BlobFile for ReadHandle {
    fn location(&self) -> &ObjectLocation {
        &self.core.location
    }

    fn owns_client(&self) -> bool {
        self.core.client.is_owned()
    }

    fn open(&self, path: &str) -> Result<ReadHandle> {
        ReadHandle::from_core(self.core.sibling(path)?)
    }

    fn create(&self, path: &str) -> Result<WriteHandle> {
        WriteHandle::from_core(self.core.sibling(path)?)
    }

    fn close(self) -> Result<()> {
        let ReadHandle { core, stream, .. } = self;
        stream.close()?;
        core.client.release()
    }
}

impl Read for ReadHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if let Some(err) = self.deferred.take() {
            return Err(err.into());
        }

        let outcome = self.read_full(buf);
        match outcome.stop {
            Some(ReadStop::Failed(err)) if outcome.len == 0 => Err(err.into()),
            Some(ReadStop::Failed(err)) => {
                self.deferred = Some(err);
                Ok(outcome.len)
            }
            _ => Ok(outcome.len),
        }
    }
}

impl Seek for ReadHandle {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.core.seek(pos)
    }
}
