//! Trait wrapper around the bucket client to allow fake injection during tests.
use anyhow::Error;
use async_trait::async_trait;
use s3stash::{Bucket, ByteStream, ObjectMeta};

/// A private wrapper around the necessary methods of the bucket client.
#[async_trait]
pub(super) trait ObjectService {
    async fn get_object(&self, key: &str)
        -> std::result::Result<(ByteStream, ObjectMeta), Error>;
}

/// Trivial implementation of the ObjectService trait for the Bucket client struct
#[async_trait]
impl ObjectService for Bucket {
    async fn get_object(
        &self,
        key: &str,
    ) -> std::result::Result<(ByteStream, ObjectMeta), Error> {
        (self as &Bucket).get_object(key).await
    }
}
