use anyhow::Result;
use async_trait::async_trait;
use s3stash::{ByteStream, Length};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::AsyncSeekExt;

/// A BodyFactory can produce, on demand, a fresh [ByteStream] containing the object
/// content.  The service consumes the body of each `PutObject` request, so in the event
/// of an upload failure the restarted upload needs a new body that starts reading the
/// object content at the beginning.
#[async_trait]
pub trait BodyFactory {
    async fn get_body(&mut self) -> Result<ByteStream>;
}

/// A CursorBodyFactory creates bodies from an in-memory buffer, allowing uploads from
/// in-memory data.  Note that this struct clones the given data for each retry, although
/// this behavior may be optimized in the future.
pub struct CursorBodyFactory(Vec<u8>);

#[async_trait]
impl BodyFactory for CursorBodyFactory {
    async fn get_body(&mut self) -> Result<ByteStream> {
        Ok(ByteStream::from(self.0.clone()))
    }
}

impl CursorBodyFactory {
    pub fn new(buf: &[u8]) -> Self {
        Self(buf.to_vec())
    }
}

/// A FileBodyFactory creates bodies by rewinding and cloning a file.  The given file
/// must be open in read mode and must be clone-able (that is, [File::try_clone()] must
/// succeed).  The content length is fixed at construction, so the file must not change
/// size while an upload is in progress.
pub struct FileBodyFactory {
    file: File,
    content_length: u64,
}

#[async_trait]
impl BodyFactory for FileBodyFactory {
    async fn get_body(&mut self) -> Result<ByteStream> {
        let mut file = self.file.try_clone().await?;
        file.seek(SeekFrom::Start(0)).await?;
        let body = ByteStream::read_from()
            .file(file)
            .length(Length::Exact(self.content_length))
            .build()
            .await?;
        Ok(body)
    }
}

impl FileBodyFactory {
    pub fn new(file: File, content_length: u64) -> Self {
        Self {
            file,
            content_length,
        }
    }
}
