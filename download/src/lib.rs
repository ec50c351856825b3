/*! Support for downloading data from an S3-compatible object store.

This crate provides a set of functions to fetch an object with `GetObject`, retrying
transient failures with exponential backoff and restarting the write from the beginning
on each attempt.

Each function takes the key of the object to fetch, a [s3stash::Retry] configuration, a
[s3stash::Bucket] client, and a destination for the data, and returns the object's
[s3stash::ObjectMeta] on success.  An attempt only counts as successful once the number
of bytes written matches the content length the service advertised; every write along
the way is bounded by the number of bytes actually read from the body stream.

## Convenience Functions

Most uses of this crate can utilize [download_to_vec], [download_to_buf], or
[download_to_file].

## Factories

A download may be retried, in which case the download function must have a fresh,
empty destination for each attempt.  This is accomplished with the
[`AsyncWriterFactory`](crate::AsyncWriterFactory) trait, which defines a `get_writer`
method to generate a fresh [tokio::io::AsyncWrite] for each attempt.  Users for whom the
supplied convenience functions are inadequate can add their own implementation of this
trait.

 */
use anyhow::{anyhow, Context, Error, Result};
use s3stash::retry::{Backoff, Retry};
use s3stash::{err_is_transient, Bucket, ObjectMeta};
use tokio::fs::File;
use tokio::io::{copy, AsyncWriteExt};

mod factory;
pub mod hashing;
mod service;
#[cfg(test)]
mod test_helpers;

pub use factory::{AsyncWriterFactory, CursorWriterFactory, FileWriterFactory};
use service::ObjectService;

/// Download an object to a [Vec<u8>] and return that.  If the object is unexpectedly
/// large, this may exhaust system memory and panic.  Returns (data, meta).
pub async fn download_to_vec(
    key: &str,
    retry: &Retry,
    bucket: &Bucket,
) -> Result<(Vec<u8>, ObjectMeta)> {
    let mut factory = CursorWriterFactory::new();
    let meta = download_impl(key, retry, bucket, &mut factory).await?;
    Ok((factory.into_inner(), meta))
}

/// Download an object into the given buffer and return the slice of that buffer containing the
/// object.  If the object is larger than the buffer, then the resulting error can be downcast to
/// [std::io::Error] with kind `WriteZero` and the somewhat cryptic message "write zero byte into
/// writer".  Returns (slice, meta).
pub async fn download_to_buf<'a>(
    key: &str,
    retry: &Retry,
    bucket: &Bucket,
    buf: &'a mut [u8],
) -> Result<(&'a [u8], ObjectMeta)> {
    let mut factory = CursorWriterFactory::for_buf(buf);
    let meta = download_impl(key, retry, bucket, &mut factory).await?;
    let size = factory.size();
    Ok((&buf[..size], meta))
}

/// Download an object into the given File.  The file must be open in write mode and must be
/// clone-able (that is, [File::try_clone()] must succeed) in order to support retried downloads.
/// The File is returned with all write operations complete but with unspecified position.
/// Returns (file, meta).
pub async fn download_to_file(
    key: &str,
    retry: &Retry,
    bucket: &Bucket,
    file: File,
) -> Result<(File, ObjectMeta)> {
    let mut factory = FileWriterFactory::new(file);
    let meta = download_impl(key, retry, bucket, &mut factory).await?;
    Ok((factory.into_inner().await?, meta))
}

/// Download an object using an [AsyncWriterFactory].  This is useful for advanced cases where one
/// of the convenience functions is not adequate.  Returns the object's metadata.
pub async fn download_with_factory<AWF: AsyncWriterFactory>(
    key: &str,
    retry: &Retry,
    bucket: &Bucket,
    writer_factory: &mut AWF,
) -> Result<ObjectMeta> {
    let meta = download_impl(key, retry, bucket, writer_factory).await?;
    Ok(meta)
}

/// A result from a possibly-retriable operation.
enum RetriableResult<R, E> {
    /// Operation failed, but could be retried
    Retriable(E),
    /// Operation failed, and should not be retried
    Permanent(E),
    /// Operation succeeded
    Ok(R),
}

/// Internal implementation of downloads, using the ObjectService trait to allow
/// injecting a fake dependency.  Returns the object's metadata.
async fn download_impl<O: ObjectService, AWF: AsyncWriterFactory>(
    key: &str,
    retry: &Retry,
    object_service: &O,
    writer_factory: &mut AWF,
) -> Result<ObjectMeta> {
    let mut backoff = Backoff::new(retry);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match download_attempt(key, object_service, writer_factory).await {
            RetriableResult::Ok(meta) => return Ok(meta),
            RetriableResult::Retriable(err) => match backoff.next_backoff() {
                Some(duration) => {
                    tokio::time::sleep(duration).await;
                    continue;
                }
                None => {
                    return Err(err).context(format!("Download failed after {} attempts", attempts))
                }
            },
            RetriableResult::Permanent(err) => {
                return Err(err);
            }
        }
    }
}

/// Fetch the object once and write it to a fresh writer from the factory.  The return
/// value indicates whether the operation can be retried.
async fn download_attempt<O: ObjectService, AWF: AsyncWriterFactory>(
    key: &str,
    object_service: &O,
    writer_factory: &mut AWF,
) -> RetriableResult<ObjectMeta, Error> {
    let (body, meta) = match object_service.get_object(key).await {
        Ok(res) => res,
        Err(err) => {
            if err_is_transient(&err) {
                return RetriableResult::Retriable(err);
            } else {
                return RetriableResult::Permanent(err);
            }
        }
    };

    let mut writer = match writer_factory.get_writer().await {
        Ok(w) => w,
        // getting a writer from the factory is not retriable
        Err(e) => return RetriableResult::Permanent(e),
    };

    // copy bytes from the body to the writer; each write is bounded by the number of
    // bytes actually read from the stream
    let mut reader = body.into_async_read();
    let written = match copy(&mut reader, &mut writer).await {
        Ok(written) => written,
        // an error copying data from the remote is common and retriable
        Err(e) => return RetriableResult::Retriable(e.into()),
    };

    if let Err(e) = writer.flush().await {
        return RetriableResult::Retriable(e.into());
    }

    // a short body means the connection dropped mid-stream
    if meta.content_length != 0 && written != meta.content_length {
        return RetriableResult::Retriable(anyhow!(
            "Object content was {} bytes, but the service advertised {}",
            written,
            meta.content_length
        ));
    }

    RetriableResult::Ok(meta)
}
