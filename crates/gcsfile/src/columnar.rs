//! Parquet I/O over blob handles.
//!
//! - [`write_batches`] streams Arrow record batches into a [`WriteHandle`]
//!   through `parquet::arrow::ArrowWriter` and commits the object.
//! - [`read_batches`] decodes a whole object from a [`ReadHandle`]. Object
//!   streams cannot seek, and the Parquet footer sits at the end of the file,
//!   so the object is read sequentially into memory first.

use crate::{BlobFile, ReadHandle, ReadStop, Result, WriteHandle};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use tracing::debug;

/// Rows per decoded batch
const READ_BATCH_SIZE: usize = 64 * 1024;

/// Write `batches` as a Parquet file and close the handle.
///
/// A zero-length `batches` still produces a valid file carrying `schema`.
/// When writing fails the handle is dropped and nothing is committed.
///
/// # Errors
/// Returns an error if encoding fails, the upload fails, or the handle
/// fails to close.
pub fn write_batches(
    mut handle: WriteHandle,
    schema: SchemaRef,
    batches: &[RecordBatch],
    props: Option<WriterProperties>,
) -> Result<()> {
    let mut writer = ArrowWriter::try_new(&mut handle, schema, props)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;

    debug!(
        "Wrote {} batches ({} bytes) to {}",
        batches.len(),
        handle.bytes_written(),
        handle.location()
    );
    handle.close()
}

/// Read every record batch of a Parquet object and close the handle.
///
/// # Errors
/// Returns the download error unmodified, or a Parquet/Arrow decoding error.
pub fn read_batches(mut handle: ReadHandle) -> Result<Vec<RecordBatch>> {
    let mut data = vec![0u8; handle.size()];
    let outcome = handle.read_full(&mut data);
    if let Some(ReadStop::Failed(err)) = outcome.stop {
        return Err(err);
    }
    data.truncate(outcome.len);

    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))?
        .with_batch_size(READ_BATCH_SIZE)
        .build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    debug!("Read {} batches from {}", batches.len(), handle.location());
    handle.close()?;
    Ok(batches)
}
