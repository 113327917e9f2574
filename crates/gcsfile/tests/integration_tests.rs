//! Integration tests for gcsfile

use gcsfile::{
    open_reader_with_client, open_writer_with_client, BlobFile, ClientOptions, CloudError, Context,
    DynObjectStore, FileConfig, ObjectLocation, ReadHandle, ReadStop, Result, SeekPolicy,
    StorageClient, StoreProvider, WriteHandle,
};
use gcsfile_testing::{
    init_tracing, read_object, sample_bytes, seed_object, text_lines, FaultyStore,
    FragmentingStore, TEST_BUCKET, TEST_PROJECT,
};
use object_store::memory::InMemory;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn client_over(store: Arc<DynObjectStore>) -> StorageClient {
    StorageClient::from_buckets(TEST_PROJECT, [(TEST_BUCKET, store)], ClientOptions::default())
        .unwrap()
}

fn memory_client() -> (StorageClient, Arc<InMemory>) {
    let store = Arc::new(InMemory::new());
    let shared: Arc<DynObjectStore> = store.clone();
    (client_over(shared), store)
}

fn location(path: &str) -> ObjectLocation {
    ObjectLocation::new(TEST_PROJECT, TEST_BUCKET, path).unwrap()
}

#[test]
fn test_write_and_read() {
    init_tracing();
    let (client, _store) = memory_client();
    let ctx = Context::background();
    let test_data = b"Hello, gcsfile! This is a test.";

    let mut writer =
        open_writer_with_client(&ctx, &client, TEST_PROJECT, TEST_BUCKET, "test/file.txt").unwrap();
    writer.write_all(test_data).unwrap();
    writer.close().unwrap();

    let mut reader =
        open_reader_with_client(&ctx, &client, TEST_PROJECT, TEST_BUCKET, "test/file.txt").unwrap();
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer).unwrap();
    reader.close().unwrap();

    assert_eq!(buffer, test_data);
}

#[test]
fn test_large_roundtrip_with_multipart() {
    let (client, _store) = memory_client();
    let ctx = Context::background();
    let test_data = sample_bytes(3 * 1024 * 1024 + 17);

    let config = FileConfig {
        write_buffer_size: 256 * 1024,
        multipart_threshold: 1024 * 1024,
        ..Default::default()
    };
    let mut writer = WriteHandle::create_shared(&ctx, &client, location("large.bin"), config).unwrap();
    writer.write_all(&test_data).unwrap();
    assert_eq!(writer.bytes_written(), test_data.len() as u64);
    writer.close().unwrap();

    let mut reader =
        ReadHandle::open_shared(&ctx, &client, location("large.bin"), FileConfig::default()).unwrap();
    assert_eq!(reader.size(), test_data.len());
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer).unwrap();
    assert_eq!(buffer, test_data);
}

#[test]
fn test_short_pulls_are_masked() {
    let inner = Arc::new(InMemory::new());
    seed_object(&*inner, "frag.txt", b"0123456789ABCDEFGHIJ").unwrap();
    let client = client_over(Arc::new(FragmentingStore::new(inner, 1)));

    let mut reader =
        open_reader_with_client(&Context::background(), &client, TEST_PROJECT, TEST_BUCKET, "frag.txt")
            .unwrap();

    let mut buf = [0u8; 10];
    let outcome = reader.read_full(&mut buf);
    assert_eq!(outcome.len, 10);
    assert!(outcome.stop.is_none());
    assert_eq!(&buf, b"0123456789");

    // std::io::Read fills the whole buffer as well
    assert_eq!(reader.read(&mut buf).unwrap(), 10);
    assert_eq!(&buf, b"ABCDEFGHIJ");
}

#[test]
fn test_oversized_buffer_returns_short_count_and_end() {
    let inner = Arc::new(InMemory::new());
    let data = text_lines(20);
    seed_object(&*inner, "lines.txt", &data).unwrap();
    let client = client_over(Arc::new(FragmentingStore::new(inner, 7)));

    let mut reader =
        open_reader_with_client(&Context::background(), &client, TEST_PROJECT, TEST_BUCKET, "lines.txt")
            .unwrap();

    let mut buf = vec![0u8; data.len() * 2];
    let outcome = reader.read_full(&mut buf);
    assert_eq!(outcome.len, data.len());
    assert!(outcome.is_end_of_stream());
    assert_eq!(&buf[..outcome.len], &data[..]);

    let again = reader.read_full(&mut buf);
    assert_eq!(again.len, 0);
    assert!(again.is_end_of_stream());

    let mut buf = [0u8; 4];
    assert_eq!(reader.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_failure_after_partial_read() {
    let inner = Arc::new(InMemory::new());
    seed_object(&*inner, "broken.bin", &sample_bytes(100)).unwrap();
    let client = client_over(Arc::new(FaultyStore::failing_downloads_after(inner, 40)));

    let mut reader =
        open_reader_with_client(&Context::background(), &client, TEST_PROJECT, TEST_BUCKET, "broken.bin")
            .unwrap();

    let mut buf = [0u8; 64];
    let outcome = reader.read_full(&mut buf);
    assert_eq!(outcome.len, 40);
    assert!(matches!(
        outcome.stop,
        Some(ReadStop::Failed(CloudError::ObjectStore(object_store::Error::Generic { .. })))
    ));
}

#[test]
fn test_io_read_defers_error_after_partial_data() {
    let inner = Arc::new(InMemory::new());
    seed_object(&*inner, "broken.bin", &sample_bytes(100)).unwrap();
    let client = client_over(Arc::new(FaultyStore::failing_downloads_after(inner, 40)));

    let mut reader =
        open_reader_with_client(&Context::background(), &client, TEST_PROJECT, TEST_BUCKET, "broken.bin")
            .unwrap();

    let mut buf = [0u8; 64];
    assert_eq!(reader.read(&mut buf).unwrap(), 40);
    assert_eq!(&buf[..40], &sample_bytes(100)[..40]);

    let err = reader.read(&mut buf).unwrap_err();
    let inner = err.into_inner().unwrap().downcast::<CloudError>().unwrap();
    assert!(matches!(*inner, CloudError::ObjectStore(object_store::Error::Generic { .. })));
}

#[test]
fn test_missing_object_fails_to_open() {
    let (client, _store) = memory_client();
    let result =
        open_reader_with_client(&Context::background(), &client, TEST_PROJECT, TEST_BUCKET, "absent");

    let err = result.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, CloudError::ObjectStore(object_store::Error::NotFound { .. })));
}

#[test]
fn test_missing_bucket_fails_to_open() {
    let (client, _store) = memory_client();
    let err = open_writer_with_client(&Context::background(), &client, TEST_PROJECT, "other", "x")
        .unwrap_err();
    assert!(matches!(err, CloudError::BucketNotFound(ref b) if b == "other"));
}

#[test]
fn test_shared_client_survives_close() {
    let (client, _store) = memory_client();
    let ctx = Context::background();

    let mut writer = open_writer_with_client(&ctx, &client, TEST_PROJECT, TEST_BUCKET, "a.txt").unwrap();
    assert!(!writer.owns_client());
    writer.write_all(b"first").unwrap();
    writer.close().unwrap();

    // The caller's client keeps working after the handle is gone.
    assert!(!client.is_closed());
    let mut reader = open_reader_with_client(&ctx, &client, TEST_PROJECT, TEST_BUCKET, "a.txt").unwrap();
    reader.close().unwrap();

    let bucket = client.bucket(TEST_BUCKET).unwrap();
    let mut stream = bucket.object("a.txt").unwrap().new_reader(&ctx).unwrap();
    let mut buf = [0u8; 5];
    assert_eq!(stream.read(&mut buf).unwrap(), 5);
    assert_eq!(&buf, b"first");

    client.close().unwrap();
}

#[test]
fn test_owned_client_closed_with_handle() {
    let (client, store) = memory_client();
    seed_object(&*store, "owned.txt", b"payload").unwrap();
    let ctx = Context::background();

    let reader = ReadHandle::open_owned(&ctx, client, location("owned.txt"), FileConfig::default())
        .unwrap();
    assert!(reader.owns_client());
    let bucket = reader.bucket().clone();
    reader.close().unwrap();

    let err = bucket.object("owned.txt").unwrap().new_reader(&ctx).unwrap_err();
    assert!(matches!(err, CloudError::ClientClosed));
}

#[test]
fn test_owned_writer_closes_client() {
    let (client, store) = memory_client();
    let ctx = Context::background();

    let mut writer = WriteHandle::create_owned(&ctx, client, location("w.txt"), FileConfig::default())
        .unwrap();
    writer.write_all(b"data").unwrap();
    let bucket = writer.bucket().clone();
    writer.close().unwrap();

    assert_eq!(read_object(&*store, "w.txt").unwrap(), b"data");
    assert!(matches!(
        bucket.object("w.txt").unwrap().new_writer(&ctx, &FileConfig::default()),
        Err(CloudError::ClientClosed)
    ));
}

#[derive(Debug)]
struct TrackingProvider {
    store: Arc<DynObjectStore>,
    shut_down: Arc<AtomicBool>,
}

impl StoreProvider for TrackingProvider {
    fn resolve(&self, _bucket: &str) -> Result<Arc<DynObjectStore>> {
        Ok(Arc::clone(&self.store))
    }

    fn shutdown(&self) -> Result<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_close_is_fail_fast() {
    let shut_down = Arc::new(AtomicBool::new(false));
    let provider = TrackingProvider {
        store: Arc::new(FaultyStore::failing_uploads(Arc::new(InMemory::new()))),
        shut_down: shut_down.clone(),
    };
    let client =
        StorageClient::with_provider(TEST_PROJECT, Box::new(provider), ClientOptions::default())
            .unwrap();

    let ctx = Context::background();
    let mut writer = WriteHandle::create_owned(&ctx, client, location("f.txt"), FileConfig::default())
        .unwrap();
    writer.write_all(b"never lands").unwrap();

    let err = writer.close().unwrap_err();
    assert!(matches!(err, CloudError::ObjectStore(object_store::Error::Generic { .. })));
    // The stream failed to close, so the owned client was never closed.
    assert!(!shut_down.load(Ordering::SeqCst));
}

#[test]
fn test_owned_close_shuts_provider_down() {
    let shut_down = Arc::new(AtomicBool::new(false));
    let provider = TrackingProvider {
        store: Arc::new(InMemory::new()),
        shut_down: shut_down.clone(),
    };
    let client =
        StorageClient::with_provider(TEST_PROJECT, Box::new(provider), ClientOptions::default())
            .unwrap();

    let writer = WriteHandle::create_owned(
        &Context::background(),
        client,
        location("ok.txt"),
        FileConfig::default(),
    )
    .unwrap();
    writer.close().unwrap();
    assert!(shut_down.load(Ordering::SeqCst));
}

#[test]
fn test_seek_never_repositions() {
    let (client, store) = memory_client();
    let data = text_lines(10);
    seed_object(&*store, "seek.txt", &data).unwrap();

    let mut reader =
        open_reader_with_client(&Context::background(), &client, TEST_PROJECT, TEST_BUCKET, "seek.txt")
            .unwrap();

    let mut head = [0u8; 5];
    reader.read_exact(&mut head).unwrap();

    for pos in [
        SeekFrom::Start(0),
        SeekFrom::Start(500),
        SeekFrom::Current(-3),
        SeekFrom::Current(42),
        SeekFrom::End(-10),
    ] {
        assert_eq!(reader.seek(pos).unwrap(), 0);
    }

    // Reading continues exactly where it left off.
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).unwrap();
    assert_eq!(&head[..], &data[..5]);
    assert_eq!(rest, &data[5..]);
}

#[test]
fn test_reject_policy_reports_unsupported() {
    let (client, _store) = memory_client();
    let config = FileConfig {
        seek: SeekPolicy::Reject,
        ..Default::default()
    };
    let mut writer =
        WriteHandle::create_shared(&Context::background(), &client, location("r.bin"), config)
            .unwrap();
    let err = writer.seek(SeekFrom::Start(8)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_siblings_share_client_without_owning_it() {
    let (client, store) = memory_client();
    seed_object(&*store, "part-0.parquet", b"zero").unwrap();
    seed_object(&*store, "part-1.parquet", b"one").unwrap();
    let ctx = Context::background();

    let first = ReadHandle::open_owned(&ctx, client, location("part-0.parquet"), FileConfig::default())
        .unwrap();

    let mut sibling = first.open("part-1.parquet").unwrap();
    assert!(!sibling.owns_client());
    assert_eq!(sibling.location().bucket(), TEST_BUCKET);
    let mut content = String::new();
    sibling.read_to_string(&mut content).unwrap();
    sibling.close().unwrap();

    let mut output = first.create("summary.txt").unwrap();
    output.write_all(content.as_bytes()).unwrap();
    output.close().unwrap();

    // Closing siblings left the client alone; the owner still closes it.
    let bucket = first.bucket().clone();
    bucket.object("summary.txt").unwrap().new_reader(&ctx).unwrap();
    first.close().unwrap();
    assert!(matches!(
        bucket.object("summary.txt").unwrap().new_reader(&ctx),
        Err(CloudError::ClientClosed)
    ));
    assert_eq!(read_object(&*store, "summary.txt").unwrap(), b"one");
}

#[test]
fn test_expired_context_fails_open() {
    let (client, store) = memory_client();
    seed_object(&*store, "late.txt", b"x").unwrap();

    let ctx = Context::background().with_timeout(Duration::from_millis(1));
    std::thread::sleep(Duration::from_millis(5));

    let err = open_reader_with_client(&ctx, &client, TEST_PROJECT, TEST_BUCKET, "late.txt")
        .unwrap_err();
    assert!(matches!(err, CloudError::DeadlineExceeded));
}

#[test]
fn test_cancellation_stops_reads() {
    let (client, store) = memory_client();
    seed_object(&*store, "c.txt", &sample_bytes(64)).unwrap();
    let parent = Context::background();
    let ctx = parent.child();

    let mut reader = ReadHandle::open_shared(&ctx, &client, location("c.txt"), FileConfig::default())
        .unwrap();
    parent.cancel();

    let mut buf = [0u8; 8];
    let err = reader.read(&mut buf).unwrap_err();
    let inner = err.into_inner().unwrap().downcast::<CloudError>().unwrap();
    assert!(matches!(*inner, CloudError::Cancelled));
}

#[test]
fn test_location_parsed_from_url() {
    let (client, _store) = memory_client();
    let loc = ObjectLocation::parse(TEST_PROJECT, &format!("gs://{}/nested/obj.bin", TEST_BUCKET))
        .unwrap();

    let mut writer =
        WriteHandle::create_shared(&Context::background(), &client, loc.clone(), FileConfig::default())
            .unwrap();
    writer.write_all(b"via url").unwrap();
    writer.close().unwrap();

    let reader =
        ReadHandle::open_shared(&Context::background(), &client, loc, FileConfig::default()).unwrap();
    assert_eq!(reader.size(), 7);
    assert_eq!(reader.location().to_string(), format!("gs://{}/nested/obj.bin", TEST_BUCKET));
}
