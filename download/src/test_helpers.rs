//! Utilities for testing downloads
use crate::service::ObjectService;
use anyhow::{anyhow, Error};
use async_trait::async_trait;
use s3stash::{ByteStream, ObjectMeta};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Event logger, used to log events from various places and then assert on them.
#[derive(Default, Clone)]
pub(crate) struct Logger {
    logged: Arc<Mutex<Vec<String>>>,
}

impl Logger {
    pub(crate) fn log<S: Into<String>>(&self, message: S) {
        self.logged.lock().unwrap().push(message.into())
    }

    pub(crate) fn assert(&self, expected: Vec<String>) {
        assert_eq!(*self.logged.lock().unwrap(), expected);
    }
}

/// One canned `get_object` outcome for [FakeObjectService].
pub(crate) enum FakeResponse {
    /// A successful response carrying this data, with a matching content length.
    Data(Vec<u8>),
    /// A successful response carrying this data but advertising a longer content
    /// length, as seen when a connection drops mid-body.
    Truncated(Vec<u8>, u64),
    /// A transient failure (connection reset).
    Transient,
    /// A permanent failure (access denied).
    Permanent,
}

/// Fake implementation of the bucket client, serving a canned sequence of responses.
/// The last response in the sequence is repeated if the download keeps retrying.
pub(crate) struct FakeObjectService {
    pub(crate) logger: Logger,
    responses: Mutex<VecDeque<FakeResponse>>,
}

impl FakeObjectService {
    pub(crate) fn new(responses: Vec<FakeResponse>) -> Self {
        Self {
            logger: Logger::default(),
            responses: Mutex::new(responses.into()),
        }
    }

    /// A service for which every `get_object` succeeds with the given data.
    pub(crate) fn serving(data: &[u8]) -> Self {
        Self::new(vec![FakeResponse::Data(data.to_vec())])
    }
}

#[async_trait]
impl ObjectService for FakeObjectService {
    async fn get_object(
        &self,
        key: &str,
    ) -> std::result::Result<(ByteStream, ObjectMeta), Error> {
        self.logger.log(format!("getObject {}", key));
        let mut responses = self.responses.lock().unwrap();
        let response = responses
            .pop_front()
            .expect("FakeObjectService has no responses");
        let (result, repeat) = match response {
            FakeResponse::Data(data) => {
                let meta = meta_with_length(data.len() as u64);
                (
                    Ok((ByteStream::from(data.clone()), meta)),
                    FakeResponse::Data(data),
                )
            }
            FakeResponse::Truncated(data, content_length) => {
                let meta = meta_with_length(content_length);
                (
                    Ok((ByteStream::from(data.clone()), meta)),
                    FakeResponse::Truncated(data, content_length),
                )
            }
            FakeResponse::Transient => (
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "conn reset").into()),
                FakeResponse::Transient,
            ),
            FakeResponse::Permanent => (Err(anyhow!("access denied")), FakeResponse::Permanent),
        };
        // keep repeating the final response
        if responses.is_empty() {
            responses.push_back(repeat);
        }
        result
    }
}

fn meta_with_length(content_length: u64) -> ObjectMeta {
    ObjectMeta {
        content_length,
        e_tag: Some("\"fake\"".into()),
        content_type: Some("text/plain".into()),
        last_modified: None,
    }
}
