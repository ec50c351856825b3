/*! Support for uploading data to an S3-compatible object store.

This crate provides a set of functions to store an object with `PutObject`, retrying
transient failures with exponential backoff.

Each function takes the key and content type for the new object, a handle to the data to
be uploaded, and a [s3stash::Bucket] client.  The data to be uploaded can come in a
variety of forms, described below.  Uploads overwrite any existing object with the same
key.

## Convenience Functions

Most uses of this crate can utilize [upload_from_buf] or [upload_from_file], providing
the data in the form of a buffer and a [tokio::fs::File], respectively.

## Factories

An upload may be retried, in which case the upload function must have access to the
object data from the beginning.  This is accomplished with the
[`BodyFactory`](crate::BodyFactory) trait, which defines a `get_body` method to generate
a fresh body for each attempt.  Users for whom the supplied convenience functions are
inadequate can add their own implementation of this trait.

 */
use anyhow::{Context, Result};
use s3stash::retry::{Backoff, Retry};
use s3stash::{err_is_transient, Bucket};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, SeekFrom};

mod factory;
mod service;

pub use factory::{BodyFactory, CursorBodyFactory, FileBodyFactory};
use service::ObjectService;

/// Upload an object from an in-memory buffer.
pub async fn upload_from_buf(
    key: &str,
    content_type: &str,
    data: &[u8],
    retry: &Retry,
    bucket: &Bucket,
) -> Result<()> {
    upload_with_factory(
        key,
        content_type,
        data.len() as u64,
        CursorBodyFactory::new(data),
        retry,
        bucket,
    )
    .await
}

/// Upload an object from a File.  The file must be open in read mode and must be
/// clone-able (that is, [File::try_clone()] must succeed) in order to support retried
/// uploads.
pub async fn upload_from_file(
    key: &str,
    content_type: &str,
    mut file: File,
    retry: &Retry,
    bucket: &Bucket,
) -> Result<()> {
    let content_length = file.seek(SeekFrom::End(0)).await?;
    upload_with_factory(
        key,
        content_type,
        content_length,
        FileBodyFactory::new(file, content_length),
        retry,
        bucket,
    )
    .await
}

/// Upload an object using a BodyFactory.  This is useful for advanced cases where one of
/// the convenience functions is not adequate.
pub async fn upload_with_factory<BF: BodyFactory>(
    key: &str,
    content_type: &str,
    content_length: u64,
    body_factory: BF,
    retry: &Retry,
    bucket: &Bucket,
) -> Result<()> {
    upload_impl(key, content_type, content_length, body_factory, retry, bucket).await
}

/// Internal implementation of uploads, using the ObjectService trait to allow
/// injecting a fake dependency
async fn upload_impl<O: ObjectService, BF: BodyFactory>(
    key: &str,
    content_type: &str,
    content_length: u64,
    mut body_factory: BF,
    retry: &Retry,
    object_service: &O,
) -> Result<()> {
    let mut backoff = Backoff::new(retry);
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let body = body_factory.get_body().await?;
        let res = object_service
            .put_object(key, content_type, content_length, body)
            .await;

        match res {
            Ok(_) => return Ok(()),
            Err(err) if !err_is_transient(&err) => return Err(err),
            Err(err) => match backoff.next_backoff() {
                Some(duration) => tokio::time::sleep(duration).await,
                None => {
                    return Err(err)
                        .context(format!("Upload failed after {} attempts", attempts))
                }
            },
        }
    }
}
