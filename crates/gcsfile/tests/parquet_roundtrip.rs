#![cfg(feature = "parquet")]

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use gcsfile::columnar::{read_batches, write_batches};
use gcsfile::{
    BlobFile, ClientOptions, Context, DynObjectStore, FileConfig, ObjectLocation, ReadHandle,
    StorageClient, WriteHandle,
};
use gcsfile_testing::{FragmentingStore, TEST_BUCKET, TEST_PROJECT};
use object_store::memory::InMemory;
use std::sync::Arc;

fn sample_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("score", DataType::Float64, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
            Arc::new(StringArray::from(vec!["a", "b", "c", "d"])),
            Arc::new(Float64Array::from(vec![Some(0.5), None, Some(2.0), Some(3.5)])),
        ],
    )
    .unwrap()
}

fn location(path: &str) -> ObjectLocation {
    ObjectLocation::new(TEST_PROJECT, TEST_BUCKET, path).unwrap()
}

#[test]
fn test_parquet_through_fragmented_downloads() {
    let inner: Arc<DynObjectStore> = Arc::new(InMemory::new());
    let store: Arc<DynObjectStore> = Arc::new(FragmentingStore::new(inner, 13));
    let client =
        StorageClient::from_buckets(TEST_PROJECT, [(TEST_BUCKET, store)], ClientOptions::default())
            .unwrap();
    let ctx = Context::background();
    let batch = sample_batch();

    let writer =
        WriteHandle::create_shared(&ctx, &client, location("t/part-0.parquet"), FileConfig::default())
            .unwrap();
    write_batches(writer, batch.schema(), &[batch.clone()], None).unwrap();

    let reader =
        ReadHandle::open_shared(&ctx, &client, location("t/part-0.parquet"), FileConfig::default())
            .unwrap();
    let batches = read_batches(reader).unwrap();

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], batch);
    client.close().unwrap();
}

#[test]
fn test_owned_writer_closes_client_after_commit() {
    let store: Arc<DynObjectStore> = Arc::new(InMemory::new());
    let client =
        StorageClient::from_buckets(TEST_PROJECT, [(TEST_BUCKET, store)], ClientOptions::default())
            .unwrap();
    let ctx = Context::background();
    let schema = sample_batch().schema();

    let writer = WriteHandle::create_owned(&ctx, client, location("empty.parquet"), FileConfig::default())
        .unwrap();
    assert!(writer.open("missing.parquet").unwrap_err().is_not_found());

    // Siblings share the owner's client, which is still open here.
    let reader = writer.open("empty.parquet");
    assert!(reader.unwrap_err().is_not_found());

    let bucket = writer.bucket().clone();
    write_batches(writer, schema, &[], None).unwrap();

    // The owning writer closed the client along with itself.
    assert!(matches!(
        bucket.object("empty.parquet").unwrap().new_reader(&ctx),
        Err(gcsfile::CloudError::ClientClosed)
    ));
}

#[test]
fn test_sibling_reads_back_parquet() {
    let store: Arc<DynObjectStore> = Arc::new(InMemory::new());
    let client =
        StorageClient::from_buckets(TEST_PROJECT, [(TEST_BUCKET, store)], ClientOptions::default())
            .unwrap();
    let ctx = Context::background();
    let batch = sample_batch();

    let first = WriteHandle::create_owned(&ctx, client, location("a.parquet"), FileConfig::default())
        .unwrap();
    let second = first.create("b.parquet").unwrap();
    write_batches(second, batch.schema(), &[batch.clone()], None).unwrap();

    let batches = read_batches(first.open("b.parquet").unwrap()).unwrap();
    assert_eq!(batches, vec![batch.clone()]);

    write_batches(first, batch.schema(), &[], None).unwrap();
}
