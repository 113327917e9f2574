//! Storage client, bucket and object handles

use crate::reader::ObjectReader;
use crate::runtime::build_runtime;
use crate::writer::ObjectWriter;
use crate::{location::parse_object_path, ClientOptions, CloudError, Context, FileConfig, Result};
use lru::LruCache;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path;
use object_store::DynObjectStore;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Runtime;
use tracing::debug;

/// Resolves bucket names to object stores.
///
/// This is the seam through which a client reaches the network. The GCS
/// provider discovers credentials from the environment; tests and emulators
/// inject their own stores.
pub trait StoreProvider: Send + Sync + fmt::Debug {
    /// Resolve the store backing `bucket`. The bucket is never created.
    fn resolve(&self, bucket: &str) -> Result<Arc<DynObjectStore>>;

    /// Release connections held by the provider
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Google Cloud Storage provider with a bounded cache of per-bucket stores
pub struct GcsProvider {
    options: ClientOptions,
    cache: Mutex<LruCache<String, Arc<DynObjectStore>>>,
}

impl GcsProvider {
    pub fn new(options: ClientOptions) -> Self {
        let capacity =
            NonZeroUsize::new(options.bucket_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            options,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn build(&self, bucket: &str) -> Result<Arc<DynObjectStore>> {
        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket);
        if let Some(path) = &self.options.service_account_path {
            builder = builder.with_service_account_path(path.to_string_lossy());
        }
        if let Some(key) = &self.options.service_account_key {
            builder = builder.with_service_account_key(key);
        }
        if let Some(path) = &self.options.application_credentials {
            builder = builder.with_application_credentials(path.to_string_lossy());
        }
        let store = builder.build().map_err(CloudError::ObjectStore)?;
        Ok(Arc::new(store))
    }
}

impl fmt::Debug for GcsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsProvider")
            .field("bucket_cache_size", &self.options.bucket_cache_size)
            .finish_non_exhaustive()
    }
}

impl StoreProvider for GcsProvider {
    fn resolve(&self, bucket: &str) -> Result<Arc<DynObjectStore>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = cache.get(bucket) {
            return Ok(Arc::clone(store));
        }

        debug!("Building GCS store for bucket {}", bucket);
        let store = self.build(bucket)?;
        cache.put(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }

    fn shutdown(&self) -> Result<()> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }
}

/// A fixed set of pre-built bucket stores
#[derive(Debug)]
pub struct StaticProvider {
    buckets: HashMap<String, Arc<DynObjectStore>>,
}

impl StaticProvider {
    pub fn new<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = (S, Arc<DynObjectStore>)>,
        S: Into<String>,
    {
        Self {
            buckets: buckets.into_iter().map(|(name, store)| (name.into(), store)).collect(),
        }
    }
}

impl StoreProvider for StaticProvider {
    fn resolve(&self, bucket: &str) -> Result<Arc<DynObjectStore>> {
        self.buckets
            .get(bucket)
            .cloned()
            .ok_or_else(|| CloudError::BucketNotFound(bucket.to_string()))
    }
}

struct ClientInner {
    project: String,
    provider: Box<dyn StoreProvider>,
    runtime: Runtime,
    closed: AtomicBool,
}

/// Connection to the object store, shared by every handle derived from it.
///
/// The value returned by a constructor is the *owner*: only it can close the
/// client, and closing consumes it. Handles opened with `&client` hold a
/// borrowed view that never closes anything.
pub struct StorageClient {
    inner: Arc<ClientInner>,
}

impl StorageClient {
    /// Connect to Google Cloud Storage, discovering credentials from `options`
    /// and the environment
    pub fn connect(ctx: &Context, project: &str, options: ClientOptions) -> Result<Self> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let runtime = build_runtime(&options)?;
        debug!("Connecting storage client for project {}", project);
        Ok(Self::assemble(project, Box::new(GcsProvider::new(options)), runtime))
    }

    /// Build a client over pre-built stores, one per bucket name
    pub fn from_buckets<I, S>(project: &str, buckets: I, options: ClientOptions) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Arc<DynObjectStore>)>,
        S: Into<String>,
    {
        Self::with_provider(project, Box::new(StaticProvider::new(buckets)), options)
    }

    /// Build a client over a custom provider
    pub fn with_provider(
        project: &str,
        provider: Box<dyn StoreProvider>,
        options: ClientOptions,
    ) -> Result<Self> {
        let runtime = build_runtime(&options)?;
        Ok(Self::assemble(project, provider, runtime))
    }

    fn assemble(project: &str, provider: Box<dyn StoreProvider>, runtime: Runtime) -> Self {
        StorageClient {
            inner: Arc::new(ClientInner {
                project: project.to_string(),
                provider,
                runtime,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// A non-owning view of this client
    pub(crate) fn share(&self) -> StorageClient {
        StorageClient {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn project(&self) -> &str {
        &self.inner.project
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(CloudError::ClientClosed);
        }
        Ok(())
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Resolve a handle to an existing bucket
    pub fn bucket(&self, name: &str) -> Result<Bucket> {
        self.ensure_open()?;
        let store = self.inner.provider.resolve(name)?;
        Ok(Bucket {
            name: name.to_string(),
            store,
            client: self.share(),
        })
    }

    /// Close the client. Every bucket and object handle derived from it
    /// fails with [`CloudError::ClientClosed`] afterwards.
    pub fn close(self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Err(CloudError::ClientClosed);
        }
        debug!("Closing storage client for project {}", self.inner.project);
        self.inner.provider.shutdown()
    }
}

impl fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageClient")
            .field("project", &self.inner.project)
            .field("provider", &self.inner.provider)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Who is responsible for closing a handle's client
#[derive(Debug)]
pub(crate) enum ClientHandle {
    /// Constructed for (or handed to) the handle; closed with it
    Owned(StorageClient),
    /// Supplied by the caller; never closed by the handle
    Borrowed(StorageClient),
}

impl ClientHandle {
    pub(crate) fn client(&self) -> &StorageClient {
        match self {
            ClientHandle::Owned(client) | ClientHandle::Borrowed(client) => client,
        }
    }

    pub(crate) fn is_owned(&self) -> bool {
        matches!(self, ClientHandle::Owned(_))
    }

    /// Close the client if this handle owns it
    pub(crate) fn release(self) -> Result<()> {
        match self {
            ClientHandle::Owned(client) => client.close(),
            ClientHandle::Borrowed(_) => Ok(()),
        }
    }
}

/// Handle to a bucket; does not own the client
pub struct Bucket {
    name: String,
    store: Arc<DynObjectStore>,
    client: StorageClient,
}

impl Clone for Bucket {
    fn clone(&self) -> Self {
        Bucket {
            name: self.name.clone(),
            store: Arc::clone(&self.store),
            client: self.client.share(),
        }
    }
}

impl Bucket {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to an object in this bucket. Nothing is fetched.
    pub fn object(&self, path: &str) -> Result<ObjectHandle> {
        Ok(ObjectHandle {
            bucket: self.clone(),
            path: parse_object_path(path)?,
        })
    }

    pub(crate) fn object_at(&self, path: Path) -> ObjectHandle {
        ObjectHandle {
            bucket: self.clone(),
            path,
        }
    }

    pub(crate) fn store(&self) -> &Arc<DynObjectStore> {
        &self.store
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        self.client.runtime()
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        self.client.ensure_open()
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Handle to a single object
#[derive(Debug, Clone)]
pub struct ObjectHandle {
    bucket: Bucket,
    path: Path,
}

impl ObjectHandle {
    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a download stream. Fails if the object does not exist.
    pub fn new_reader(&self, ctx: &Context) -> Result<ObjectReader> {
        self.bucket.ensure_open()?;
        ObjectReader::open(self.clone(), ctx.clone())
    }

    /// Open an upload stream. The object becomes visible when the stream
    /// is closed.
    pub fn new_writer(&self, ctx: &Context, config: &FileConfig) -> Result<ObjectWriter> {
        self.bucket.ensure_open()?;
        Ok(ObjectWriter::new(self.clone(), ctx.clone(), config.clone()))
    }
}
