//! Trait wrapper around the bucket client to allow fake injection during tests.
use anyhow::Error;
use async_trait::async_trait;
use s3stash::{Bucket, ByteStream};

/// A private wrapper around the necessary methods of the bucket client.
#[async_trait]
pub(super) trait ObjectService {
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        content_length: u64,
        body: ByteStream,
    ) -> std::result::Result<(), Error>;
}

/// Trivial implementation of the ObjectService trait for the Bucket client struct
#[async_trait]
impl ObjectService for Bucket {
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        content_length: u64,
        body: ByteStream,
    ) -> std::result::Result<(), Error> {
        (self as &Bucket)
            .put_object(key, content_type, content_length, body)
            .await
    }
}
