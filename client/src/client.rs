use crate::retry::{Backoff, Retry};
use crate::util::err_is_transient;
use crate::Credentials;
use anyhow::{bail, Context, Result};
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{
    Credentials as SdkCredentials, Region, RequestChecksumCalculation,
    StalledStreamProtectionConfig,
};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// ClientBuilder implements the builder pattern for building a [Bucket], allowing
/// optional configuration of features such as credentials, endpoint and retry.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    region: String,
    credentials: Option<Credentials>,
    endpoint_url: Option<String>,
    retry: Retry,
    timeout: Duration,
}

impl ClientBuilder {
    /// Create a new ClientBuilder.  The region is required and so must always be
    /// specified.
    pub fn new<S: Into<String>>(region: S) -> Self {
        Self {
            region: region.into(),
            credentials: None,
            endpoint_url: None,
            retry: Retry::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Add credentials to the client.  Without credentials, requests are only useful
    /// against deployments that allow anonymous access.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the retry configuration for the bucket's metadata operations (`stat`,
    /// `exists`, `delete_object`).
    pub fn retry(mut self, retry: Retry) -> Self {
        self.retry = retry;
        self
    }

    /// Set the timeout for each request attempt made by the client.  The default is
    /// 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point the client at an S3-compatible deployment (MinIO, R2, or a test server)
    /// instead of AWS itself.  Such deployments are addressed path-style, so this also
    /// enables `force_path_style`.
    pub fn endpoint_url<S: Into<String>>(mut self, endpoint_url: S) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }
}

/// Bucket is the entry point into all the functionality in this crate: a client
/// bound to a single bucket name.  Once built, a Bucket is immutable.
pub struct Bucket {
    s3: aws_sdk_s3::Client,
    bucket: String,
    retry: Retry,
}

/// The metadata subset of an object that `HeadObject` and `GetObject` both report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Size of the object in bytes.  Zero when the service did not report a length.
    pub content_length: u64,
    /// Entity tag, as returned by the service (usually a quoted string).
    pub e_tag: Option<String>,
    /// Content type recorded for the object.
    pub content_type: Option<String>,
    /// Last modification time.
    pub last_modified: Option<DateTime<Utc>>,
}

fn object_meta(
    content_length: Option<i64>,
    e_tag: Option<&str>,
    content_type: Option<&str>,
    last_modified: Option<&aws_sdk_s3::primitives::DateTime>,
) -> ObjectMeta {
    ObjectMeta {
        content_length: content_length
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0),
        e_tag: e_tag.map(str::to_string),
        content_type: content_type.map(str::to_string),
        last_modified: last_modified
            .and_then(|dt| Utc.timestamp_opt(dt.secs(), dt.subsec_nanos()).single()),
    }
}

impl Bucket {
    /// Create a new Bucket from a ClientBuilder and a bucket name.
    pub fn new<S: Into<String>>(builder: ClientBuilder, bucket: S) -> Result<Bucket> {
        let bucket = bucket.into();
        if builder.region.is_empty() {
            bail!("region must not be empty");
        }
        if bucket.is_empty() {
            bail!("bucket name must not be empty");
        }

        // The SDK's retry machinery is disabled: retries are counted and spaced by
        // this workspace's Retry so that upload/download can re-create streaming
        // bodies between attempts.  Request checksums are likewise left to callers;
        // WhenRequired keeps PUT bodies un-chunked for S3-compatible deployments.
        let mut config = aws_sdk_s3::Config::builder()
            .region(Region::new(builder.region))
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_attempt_timeout(builder.timeout)
                    .build(),
            )
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled());

        if let Some(credentials) = builder.credentials {
            config = config.credentials_provider(SdkCredentials::new(
                credentials.access_key,
                credentials.secret_key,
                credentials.session_token,
                None,
                "s3stash",
            ));
        }

        if let Some(endpoint_url) = builder.endpoint_url {
            config = config.endpoint_url(endpoint_url).force_path_style(true);
        }

        Ok(Bucket {
            s3: aws_sdk_s3::Client::from_conf(config.build()),
            bucket,
            retry: builder.retry,
        })
    }

    /// The name of the bucket this client addresses.
    pub fn name(&self) -> &str {
        self.bucket.as_ref()
    }

    /// Fetch an object's metadata with `HeadObject`, without fetching any of its
    /// content.  Returns `None` if the object does not exist.  Transient failures are
    /// retried per the builder's [Retry].
    pub async fn stat(&self, key: &str) -> Result<Option<ObjectMeta>> {
        let mut backoff = Backoff::new(&self.retry);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let err = match self
                .s3
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                Ok(head) => {
                    return Ok(Some(object_meta(
                        head.content_length(),
                        head.e_tag(),
                        head.content_type(),
                        head.last_modified(),
                    )))
                }
                Err(err) => err,
            };

            // absence is data, not an error
            if err
                .as_service_error()
                .is_some_and(HeadObjectError::is_not_found)
            {
                return Ok(None);
            }

            let err = anyhow::Error::from(err);
            if !err_is_transient(&err) {
                return Err(err.context(format!("HeadObject s3://{}/{}", self.bucket, key)));
            }
            match backoff.next_backoff() {
                Some(duration) => tokio::time::sleep(duration).await,
                None => {
                    return Err(err.context(format!(
                        "HeadObject s3://{}/{} failed after {} attempts",
                        self.bucket, key, attempts
                    )))
                }
            }
        }
    }

    /// Whether an object with the given key exists.  This is a metadata probe; no
    /// object content is transferred.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.stat(key).await?.is_some())
    }

    /// Store an object with a single `PutObject` request, replacing any existing
    /// object with the same key.  This is a single attempt: a consumed body cannot be
    /// replayed, so retries belong to callers that can produce a fresh body (see
    /// `s3stash-upload`).  Objects larger than the 5 GB single-request limit are out
    /// of scope for this client.
    pub async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        content_length: u64,
        body: ByteStream,
    ) -> Result<()> {
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(content_length as i64)
            .body(body)
            .send()
            .await
            .map_err(anyhow::Error::from)
            .with_context(|| format!("PutObject s3://{}/{}", self.bucket, key))?;
        Ok(())
    }

    /// Start fetching an object with a single `GetObject` request, returning the
    /// content stream along with the object's metadata.  Like [Bucket::put_object]
    /// this is a single attempt; `s3stash-download` layers retries on top.
    pub async fn get_object(&self, key: &str) -> Result<(ByteStream, ObjectMeta)> {
        let res = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(anyhow::Error::from)
            .with_context(|| format!("GetObject s3://{}/{}", self.bucket, key))?;
        let meta = object_meta(
            res.content_length(),
            res.e_tag(),
            res.content_type(),
            res.last_modified(),
        );
        Ok((res.body, meta))
    }

    /// Delete an object.  Deleting a key that does not exist succeeds.  Transient
    /// failures are retried per the builder's [Retry].
    pub async fn delete_object(&self, key: &str) -> Result<()> {
        let mut backoff = Backoff::new(&self.retry);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let err = match self
                .s3
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                Ok(_) => return Ok(()),
                Err(err) => anyhow::Error::from(err),
            };

            if !err_is_transient(&err) {
                return Err(err.context(format!("DeleteObject s3://{}/{}", self.bucket, key)));
            }
            match backoff.next_backoff() {
                Some(duration) => tokio::time::sleep(duration).await,
                None => {
                    return Err(err.context(format!(
                        "DeleteObject s3://{}/{} failed after {} attempts",
                        self.bucket, key, attempts
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{err_object_not_found, err_status_code};
    use anyhow::Error;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use std::time::Duration;

    fn test_bucket(server: &Server, retry: Retry) -> Result<Bucket> {
        Bucket::new(
            ClientBuilder::new("us-east-1")
                .credentials(Credentials::new("akid", "secret"))
                .endpoint_url(format!("http://{}", server.addr()))
                .retry(retry),
            "test-bucket",
        )
    }

    fn retry_fast() -> Retry {
        Retry {
            retries: 6,
            max_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[test]
    fn empty_region_rejected() {
        assert!(Bucket::new(ClientBuilder::new(""), "bucket").is_err());
    }

    #[test]
    fn empty_bucket_rejected() {
        assert!(Bucket::new(ClientBuilder::new("us-east-1"), "").is_err());
    }

    #[tokio::test]
    async fn stat_found() -> Result<(), Error> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/test-bucket/some/object"))
                .respond_with(
                    status_code(200)
                        .insert_header("Content-Length", "12")
                        .insert_header("Content-Type", "text/plain")
                        .insert_header("ETag", "\"abc123\"")
                        .insert_header("Last-Modified", "Wed, 12 Oct 2022 17:15:31 GMT"),
                ),
        );

        let bucket = test_bucket(&server, Retry::default())?;
        let meta = bucket.stat("some/object").await?.expect("object exists");
        assert_eq!(meta.content_length, 12);
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert_eq!(meta.e_tag.as_deref(), Some("\"abc123\""));
        assert_eq!(
            meta.last_modified,
            Utc.with_ymd_and_hms(2022, 10, 12, 17, 15, 31).single()
        );
        Ok(())
    }

    #[tokio::test]
    async fn stat_not_found() -> Result<(), Error> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/test-bucket/no/such/object"))
                .times(2) // one stat, one exists
                .respond_with(status_code(404)),
        );

        let bucket = test_bucket(&server, retry_fast())?;
        assert_eq!(bucket.stat("no/such/object").await?, None);
        assert!(!bucket.exists("no/such/object").await?);
        Ok(())
    }

    #[tokio::test]
    async fn stat_retries_500s() -> Result<(), Error> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/test-bucket/flaky"))
                .times(3)
                .respond_with(cycle(vec![
                    Box::new(status_code(500)),
                    Box::new(status_code(500)),
                    Box::new(status_code(200).insert_header("Content-Length", "3")),
                ])),
        );

        let bucket = test_bucket(&server, retry_fast())?;
        let meta = bucket.stat("flaky").await?.expect("object exists");
        assert_eq!(meta.content_length, 3);
        Ok(())
    }

    #[tokio::test]
    async fn stat_500_exhausts_retries() -> Result<(), Error> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/test-bucket/broken"))
                .times(3) // 1 try, 2 retries
                .respond_with(status_code(500)),
        );

        let bucket = test_bucket(
            &server,
            Retry {
                retries: 2,
                max_delay: Duration::from_millis(1),
                ..Default::default()
            },
        )?;
        let err = bucket.stat("broken").await.unwrap_err();
        assert_eq!(err_status_code(&err), Some(500));
        assert!(err_is_transient(&err));
        Ok(())
    }

    #[tokio::test]
    async fn stat_403_no_retry() -> Result<(), Error> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/test-bucket/forbidden"))
                .times(1)
                .respond_with(status_code(403)),
        );

        let bucket = test_bucket(&server, retry_fast())?;
        let err = bucket.stat("forbidden").await.unwrap_err();
        assert_eq!(err_status_code(&err), Some(403));
        assert!(!err_is_transient(&err));
        Ok(())
    }

    #[tokio::test]
    async fn stat_times_out() -> Result<(), Error> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/test-bucket/slow")).respond_with(
                // the test does not wait for this to actually elapse, so it is a
                // very long delay to avoid any test intermittency
                delay_and_then(Duration::from_secs(30), status_code(200)),
            ),
        );

        let bucket = Bucket::new(
            ClientBuilder::new("us-east-1")
                .credentials(Credentials::new("akid", "secret"))
                .endpoint_url(format!("http://{}", server.addr()))
                .timeout(Duration::from_millis(5))
                .retry(Retry {
                    retries: 0,
                    ..Default::default()
                }),
            "test-bucket",
        )?;
        let err = bucket.stat("slow").await.unwrap_err();
        assert!(err_is_transient(&err));
        Ok(())
    }

    #[tokio::test]
    async fn put_object_sends_body() -> Result<(), Error> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", "/test-bucket/some/object"),
                request::body("hello, world"),
            ])
            .times(1)
            .respond_with(status_code(200)),
        );

        let bucket = test_bucket(&server, Retry::default())?;
        bucket
            .put_object(
                "some/object",
                "text/plain",
                12,
                ByteStream::from(b"hello, world".to_vec()),
            )
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn get_object_returns_body_and_meta() -> Result<(), Error> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/test-bucket/some/object"))
                .respond_with(
                    status_code(200)
                        .append_header("Content-Type", "text/plain")
                        .body("hello, world"),
                ),
        );

        let bucket = test_bucket(&server, Retry::default())?;
        let (body, meta) = bucket.get_object("some/object").await?;
        assert_eq!(meta.content_length, 12);
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        let data = body.collect().await?.into_bytes();
        assert_eq!(&data[..], b"hello, world");
        Ok(())
    }

    #[tokio::test]
    async fn get_object_not_found() -> Result<(), Error> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/test-bucket/no/such/object"))
                .times(1)
                .respond_with(status_code(404)),
        );

        let bucket = test_bucket(&server, retry_fast())?;
        let err = bucket.get_object("no/such/object").await.unwrap_err();
        assert!(err_object_not_found(&err));
        assert!(!err_is_transient(&err));
        Ok(())
    }

    #[tokio::test]
    async fn delete_object_ok() -> Result<(), Error> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("DELETE", "/test-bucket/some/object"))
                .times(1)
                .respond_with(status_code(204)),
        );

        let bucket = test_bucket(&server, retry_fast())?;
        bucket.delete_object("some/object").await?;
        Ok(())
    }

    #[tokio::test]
    async fn delete_object_retries_500s() -> Result<(), Error> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("DELETE", "/test-bucket/flaky"))
                .times(2)
                .respond_with(cycle(vec![
                    Box::new(status_code(500)),
                    Box::new(status_code(204)),
                ])),
        );

        let bucket = test_bucket(&server, retry_fast())?;
        bucket.delete_object("flaky").await?;
        Ok(())
    }
}
