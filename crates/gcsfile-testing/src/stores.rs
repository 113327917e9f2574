//! Object store wrappers that reshape or break traffic to an inner store

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use object_store::path::Path;
use object_store::{
    GetOptions, GetResult, GetResultPayload, ListResult, MultipartUpload, ObjectMeta, ObjectStore,
    PutMultipartOpts, PutOptions, PutPayload, PutResult, Result, UploadPart,
};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Splits every downloaded chunk into pieces of at most `chunk_size` bytes,
/// so a single pull from a download stream never returns much data.
#[derive(Debug)]
pub struct FragmentingStore {
    inner: Arc<dyn ObjectStore>,
    chunk_size: usize,
}

impl FragmentingStore {
    pub fn new(inner: Arc<dyn ObjectStore>, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk_size: chunk_size.max(1),
        }
    }
}

fn split(bytes: Bytes, size: usize) -> Vec<Result<Bytes>> {
    (0..bytes.len())
        .step_by(size)
        .map(|start| Ok(bytes.slice(start..(start + size).min(bytes.len()))))
        .collect()
}

fn with_stream(
    meta: ObjectMeta,
    range: std::ops::Range<usize>,
    attributes: object_store::Attributes,
    stream: BoxStream<'static, Result<Bytes>>,
) -> GetResult {
    GetResult {
        payload: GetResultPayload::Stream(stream),
        meta,
        range,
        attributes,
    }
}

impl fmt::Display for FragmentingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FragmentingStore({}, {})", self.inner, self.chunk_size)
    }
}

#[async_trait]
impl ObjectStore for FragmentingStore {
    async fn put_opts(&self, location: &Path, payload: PutPayload, opts: PutOptions) -> Result<PutResult> {
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> Result<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(&self, location: &Path, options: GetOptions) -> Result<GetResult> {
        let result = self.inner.get_opts(location, options).await?;
        let meta = result.meta.clone();
        let range = result.range.clone();
        let attributes = result.attributes.clone();

        let size = self.chunk_size;
        let stream = result
            .into_stream()
            .flat_map(move |chunk| {
                let pieces = match chunk {
                    Ok(bytes) => split(bytes, size),
                    Err(e) => vec![Err(e)],
                };
                stream::iter(pieces)
            })
            .boxed();

        Ok(with_stream(meta, range, attributes, stream))
    }

    async fn delete(&self, location: &Path) -> Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'_, Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&Path>) -> Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

/// What a [`FaultyStore`] breaks
#[derive(Debug, Clone, Copy)]
enum Fault {
    /// Every PUT and multipart upload fails
    Uploads,
    /// Multipart uploads accept this many parts, then fail
    PartsAfter(usize),
    /// Multipart uploads accept every part but fail to complete
    Completion,
    /// Downloads deliver this many bytes, then fail
    DownloadsAfter(usize),
}

fn injected(what: &str) -> object_store::Error {
    object_store::Error::Generic {
        store: "FaultyStore",
        source: format!("injected {} failure", what).into(),
    }
}

/// Injects failures into an inner store
#[derive(Debug)]
pub struct FaultyStore {
    inner: Arc<dyn ObjectStore>,
    fault: Fault,
    aborts: Arc<AtomicUsize>,
}

impl FaultyStore {
    fn with_fault(inner: Arc<dyn ObjectStore>, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            aborts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every upload
    pub fn failing_uploads(inner: Arc<dyn ObjectStore>) -> Self {
        Self::with_fault(inner, Fault::Uploads)
    }

    /// Let multipart uploads accept `parts` parts, then fail every part
    pub fn failing_parts_after(inner: Arc<dyn ObjectStore>, parts: usize) -> Self {
        Self::with_fault(inner, Fault::PartsAfter(parts))
    }

    /// Fail completion of every multipart upload
    pub fn failing_completion(inner: Arc<dyn ObjectStore>) -> Self {
        Self::with_fault(inner, Fault::Completion)
    }

    /// Let downloads deliver `bytes` bytes, then fail the stream
    pub fn failing_downloads_after(inner: Arc<dyn ObjectStore>, bytes: usize) -> Self {
        Self::with_fault(inner, Fault::DownloadsAfter(bytes))
    }

    /// Number of multipart uploads aborted through this store
    pub fn aborted_uploads(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

impl fmt::Display for FaultyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaultyStore({}, {:?})", self.inner, self.fault)
    }
}

/// Multipart upload that breaks according to its store's [`Fault`]
#[derive(Debug)]
struct FaultyUpload {
    inner: Box<dyn MultipartUpload>,
    fault: Fault,
    parts: usize,
    aborts: Arc<AtomicUsize>,
}

#[async_trait]
impl MultipartUpload for FaultyUpload {
    fn put_part(&mut self, data: PutPayload) -> UploadPart {
        if let Fault::PartsAfter(limit) = self.fault {
            if self.parts >= limit {
                let err = injected("part");
                return Box::pin(async move { Err::<(), _>(err) });
            }
        }
        self.parts += 1;
        self.inner.put_part(data)
    }

    async fn complete(&mut self) -> Result<PutResult> {
        match self.fault {
            Fault::Completion => Err(injected("completion")),
            _ => self.inner.complete().await,
        }
    }

    async fn abort(&mut self) -> Result<()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort().await
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn put_opts(&self, location: &Path, payload: PutPayload, opts: PutOptions) -> Result<PutResult> {
        match self.fault {
            Fault::Uploads => Err(injected("upload")),
            _ => self.inner.put_opts(location, payload, opts).await,
        }
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOpts,
    ) -> Result<Box<dyn MultipartUpload>> {
        if let Fault::Uploads = self.fault {
            return Err(injected("upload"));
        }
        let inner = self.inner.put_multipart_opts(location, opts).await?;
        Ok(Box::new(FaultyUpload {
            inner,
            fault: self.fault,
            parts: 0,
            aborts: Arc::clone(&self.aborts),
        }))
    }

    async fn get_opts(&self, location: &Path, options: GetOptions) -> Result<GetResult> {
        let result = self.inner.get_opts(location, options).await?;
        let limit = match self.fault {
            Fault::DownloadsAfter(limit) => limit,
            _ => return Ok(result),
        };

        let meta = result.meta.clone();
        let range = result.range.clone();
        let attributes = result.attributes.clone();
        let body = result.bytes().await?;

        let delivered = body.slice(..limit.min(body.len()));
        let pieces = vec![Ok(delivered), Err(injected("download"))];
        Ok(with_stream(meta, range, attributes, stream::iter(pieces).boxed()))
    }

    async fn delete(&self, location: &Path) -> Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'_, Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&Path>) -> Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}
