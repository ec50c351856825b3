use anyhow::{anyhow, Context, Error};
use serde::{Deserialize, Serialize};
use std::env;

/// Credentials represents the access key pair (and optional session token)
/// used to authenticate against an S3-compatible object store.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Access key ID
    #[serde(rename = "accessKey")]
    pub access_key: String,

    /// Secret access key
    #[serde(rename = "secretKey")]
    pub secret_key: String,

    /// Session token, for temporary credentials issued by an STS-style service
    #[serde(rename = "sessionToken")]
    pub session_token: Option<String>,
}

impl Credentials {
    /// Create a new Credentials object from environment variables:
    ///
    /// * `S3STASH_ACCESS_KEY`
    /// * `S3STASH_SECRET_KEY`
    /// * `S3STASH_SESSION_TOKEN` (optional)
    pub fn from_env() -> Result<Credentials, Error> {
        let access_key = env::var("S3STASH_ACCESS_KEY").context("S3STASH_ACCESS_KEY")?;
        let secret_key = env::var("S3STASH_SECRET_KEY").context("S3STASH_SECRET_KEY")?;

        let session_token = match env::var("S3STASH_SESSION_TOKEN") {
            Err(err) => match err {
                env::VarError::NotPresent => None,
                _ => {
                    return Err(anyhow!(
                        "Cannot read environment variable 'S3STASH_SESSION_TOKEN': {}",
                        err
                    ))
                }
            },
            Ok(token) if token.is_empty() => None,
            Ok(token) => Some(token),
        };

        Ok(Credentials {
            access_key,
            secret_key,
            session_token,
        })
    }

    /// Create a new Credentials object with an access key and secret key
    ///
    /// Examples:
    ///
    /// ```
    /// # use s3stash::Credentials;
    /// let _ = Credentials::new("my_access_key", "my_secret_key");
    /// ```
    pub fn new<S1: Into<String>, S2: Into<String>>(access_key: S1, secret_key: S2) -> Credentials {
        Credentials {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
        }
    }

    /// Create a new Credentials object with an access key, secret key, and session token
    ///
    /// Examples:
    ///
    /// ```
    /// # use s3stash::Credentials;
    /// let _ = Credentials::new_with_session_token("my_access_key", "my_secret_key", "my_token");
    /// ```
    pub fn new_with_session_token<S1, S2, S3>(
        access_key: S1,
        secret_key: S2,
        session_token: S3,
    ) -> Credentials
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Credentials {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: Some(session_token.into()),
        }
    }
}
