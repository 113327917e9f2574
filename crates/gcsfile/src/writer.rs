//! Upload streams and write handles

use crate::buffer::WriteBuffer;
use crate::client::{Bucket, ClientHandle, ObjectHandle};
use crate::file::{BlobFile, HandleCore};
use crate::{CloudError, Context, FileConfig, ObjectLocation, ReadHandle, Result, StorageClient};
use bytes::Bytes;
use object_store::{MultipartUpload, PutPayload};
use std::fmt;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Upload stream of a single object.
///
/// Data is buffered locally. Small objects are sent with a single PUT when
/// the stream is closed; once `multipart_threshold` bytes are buffered the
/// stream switches to a multipart upload and ships `write_buffer_size`
/// parts as they fill. Nothing is visible in the bucket until
/// [`close`](ObjectWriter::close) succeeds.
///
/// The first failed upload poisons the stream: any multipart upload is
/// aborted, and every later `write` or `close` fails.
pub struct ObjectWriter {
    object: ObjectHandle,
    ctx: Context,
    config: FileConfig,
    buffer: WriteBuffer,
    /// Multipart upload handle (for large objects)
    multipart: Option<Box<dyn MultipartUpload>>,
    parts: usize,
    total_written: u64,
    /// Reason of the first failed upload
    failed: Option<String>,
    /// Committed or failed; nothing is left to clean up on drop
    finished: bool,
}

impl ObjectWriter {
    pub(crate) fn new(object: ObjectHandle, ctx: Context, config: FileConfig) -> Self {
        debug!(
            "Opened upload stream for {}/{}",
            object.bucket().name(),
            object.path()
        );
        ObjectWriter {
            object,
            ctx,
            buffer: WriteBuffer::new(config.write_buffer_size),
            config,
            multipart: None,
            parts: 0,
            total_written: 0,
            failed: None,
            finished: false,
        }
    }

    /// Total bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.total_written
    }

    /// Accept the whole of `buf`, uploading full parts when in multipart mode
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.check_failed()?;
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(err) = self.ctx.err() {
            return Err(err);
        }

        self.buffer.write(buf);
        self.total_written += buf.len() as u64;

        if let Err(err) = self.ship_parts() {
            return Err(self.fail(err));
        }
        Ok(buf.len())
    }

    fn check_failed(&self) -> Result<()> {
        match &self.failed {
            Some(reason) => Err(CloudError::UploadFailed(reason.clone())),
            None => Ok(()),
        }
    }

    /// Start a multipart upload once over the threshold, then send every
    /// full part
    fn ship_parts(&mut self) -> Result<()> {
        if self.multipart.is_none()
            && self.config.use_multipart_upload
            && self.buffer.len() >= self.config.multipart_threshold
        {
            self.start_multipart()?;
        }

        if self.multipart.is_some() {
            let part_size = self.config.write_buffer_size.max(1);
            while let Some(part) = self.buffer.take_part(part_size) {
                self.upload_part(part)?;
            }
        }
        Ok(())
    }

    fn start_multipart(&mut self) -> Result<()> {
        debug!("Starting multipart upload for {}", self.object.path());
        let store = Arc::clone(self.object.bucket().store());
        let path = self.object.path().clone();
        let upload = self
            .ctx
            .block_on(self.object.bucket().runtime(), async move {
                store.put_multipart(&path).await
            })?;
        self.multipart = Some(upload);
        self.parts = 0;
        Ok(())
    }

    fn upload_part(&mut self, data: Bytes) -> Result<()> {
        if let Some(upload) = self.multipart.as_mut() {
            trace!("Uploading part {} ({} bytes)", self.parts, data.len());
            let part = upload.put_part(PutPayload::from(data));
            self.ctx.block_on(self.object.bucket().runtime(), part)?;
            self.parts += 1;
        }
        Ok(())
    }

    /// Poison the stream after a failed upload and hand the error back
    fn fail(&mut self, err: CloudError) -> CloudError {
        warn!("Upload stream for {} failed: {}", self.object.path(), err);
        self.failed = Some(err.to_string());
        self.abort_multipart();
        self.buffer.clear();
        self.finished = true;
        err
    }

    fn abort_multipart(&mut self) {
        if let Some(mut upload) = self.multipart.take() {
            debug!(
                "Aborting multipart upload for {} ({} parts sent)",
                self.object.path(),
                self.parts
            );
            let abort = upload.abort();
            if let Err(e) = Context::background().block_on(self.object.bucket().runtime(), abort) {
                warn!("Failed to abort multipart upload: {}", e);
            }
        }
    }

    fn commit(&mut self) -> Result<()> {
        if self.multipart.is_some() {
            if !self.buffer.is_empty() {
                let rest = self.buffer.take();
                self.upload_part(rest)?;
            }
            debug!(
                "Completing multipart upload for {} ({} parts)",
                self.object.path(),
                self.parts
            );
            if let Some(upload) = self.multipart.as_mut() {
                self.ctx
                    .block_on(self.object.bucket().runtime(), upload.complete())?;
            }
            self.multipart = None;
        } else {
            let data = self.buffer.take();
            debug!("Uploading {} bytes to {}", data.len(), self.object.path());
            let store = Arc::clone(self.object.bucket().store());
            let path = self.object.path().clone();
            self.ctx.block_on(self.object.bucket().runtime(), async move {
                store.put(&path, PutPayload::from(data)).await
            })?;
        }
        Ok(())
    }

    /// Commit the object. Fails without committing anything if an earlier
    /// upload failed.
    pub fn close(mut self) -> Result<()> {
        self.check_failed()?;
        match self.commit() {
            Ok(()) => {
                self.finished = true;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }
}

impl fmt::Debug for ObjectWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectWriter")
            .field("object", &self.object)
            .field("buffered", &self.buffer.len())
            .field("multipart", &self.multipart.is_some())
            .field("total_written", &self.total_written)
            .field("failed", &self.failed.is_some())
            .finish()
    }
}

impl Drop for ObjectWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if self.multipart.is_some() {
            warn!(
                "Upload stream for {} dropped without close, aborting multipart upload",
                self.object.path()
            );
            self.abort_multipart();
        } else if self.total_written > 0 {
            warn!(
                "Upload stream for {} dropped without close, discarding {} bytes",
                self.object.path(),
                self.total_written
            );
        }
        self.buffer.clear();
    }
}

/// An object opened for writing
#[derive(Debug)]
pub struct WriteHandle {
    core: HandleCore,
    stream: ObjectWriter,
}

impl WriteHandle {
    /// Create `location` with a client this handle takes ownership of.
    /// Closing the handle closes the client.
    pub fn create_owned(
        ctx: &Context,
        client: StorageClient,
        location: ObjectLocation,
        config: FileConfig,
    ) -> Result<Self> {
        Self::create_with(ctx, ClientHandle::Owned(client), location, config)
    }

    /// Create `location` with a caller's client. Closing the handle leaves
    /// the client open.
    pub fn create_shared(
        ctx: &Context,
        client: &StorageClient,
        location: ObjectLocation,
        config: FileConfig,
    ) -> Result<Self> {
        Self::create_with(ctx, ClientHandle::Borrowed(client.share()), location, config)
    }

    pub(crate) fn create_with(
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
            .new_writer(&core.ctx, &core.config)?;
        Ok(WriteHandle { core, stream })
    }

    /// Total bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.stream.bytes_written()
    }

    pub fn bucket(&self) -> &Bucket {
        &self.core.bucket
    }

    pub fn context(&self) -> &Context {
        &self.core.ctx
    }
}

impl BlobFile for WriteHandle {
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
        let WriteHandle { core, stream } = self;
        stream.close()?;
        core.client.release()
    }
}

impl Write for WriteHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(self.stream.write(buf)?)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // Objects only become visible on close
        Ok(())
    }
}

impl Seek for WriteHandle {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.core.seek(pos)
    }
}
