/*! Client library for S3-compatible object storage, as used by the s3stash tools.

This crate wraps the AWS SDK with the configuration and retry behavior shared by
the s3stash crates.  The entry point is [ClientBuilder], which builds a [Bucket]
handle bound to a single bucket name.  A `Bucket` offers the metadata operations
(`stat`, `exists`, `delete_object`) with automatic retries, plus single-attempt
`put_object` / `get_object` primitives on which `s3stash-upload` and
`s3stash-download` build their retried transfers.

The SDK's own retry machinery is disabled; all retrying in this workspace is
driven by [`Retry`](crate::retry::Retry) so that attempt counts and backoff are
in one place and streaming transfers can re-create their bodies between
attempts.

```no_run
# async fn example() -> anyhow::Result<()> {
use s3stash::{Bucket, ClientBuilder, Credentials};

let bucket = Bucket::new(
    ClientBuilder::new("eu-central-1").credentials(Credentials::from_env()?),
    "my-bucket",
)?;
assert!(bucket.exists("some/object").await?);
# Ok(())
# }
```
 */
mod client;
mod credentials;
pub mod retry;
mod util;

pub use client::{Bucket, ClientBuilder, ObjectMeta};
pub use credentials::Credentials;
pub use retry::Retry;
pub use util::{err_is_transient, err_object_not_found, err_status_code};

// Downstream crates speak the SDK's body type; re-export it so they need not
// depend on the SDK directly.
pub use aws_sdk_s3::primitives::{ByteStream, Length};

pub use chrono;
