use anyhow::Result;
use async_trait::async_trait;
use std::io::{Cursor, SeekFrom};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWrite, AsyncWriteExt};

/// An AsyncWriterFactory hands out a destination for one download attempt.  A retried
/// attempt must not append to whatever a failed attempt left behind, so the transfer
/// loop asks the factory for a writer before every attempt and the factory returns one
/// positioned at the start of an empty destination.
#[async_trait]
pub trait AsyncWriterFactory {
    /// Get a fresh [AsyncWrite], positioned where the first downloaded byte belongs.
    async fn get_writer<'a>(&'a mut self) -> Result<Box<dyn AsyncWrite + Unpin + 'a>>;
}

/// A CursorWriterFactory collects the download in memory, behind a [std::io::Cursor].
/// Two destinations are supported: [Vec<u8>], which grows to fit the object, and
/// `&mut [u8]`, which caps the object at the buffer's length.
pub struct CursorWriterFactory<T>(Cursor<T>);

#[async_trait]
impl AsyncWriterFactory for CursorWriterFactory<Vec<u8>> {
    async fn get_writer<'a>(&'a mut self) -> Result<Box<dyn AsyncWrite + Unpin + 'a>> {
        self.0.get_mut().clear();
        self.0.set_position(0);
        Ok(Box::new(&mut self.0))
    }
}

#[async_trait]
impl AsyncWriterFactory for CursorWriterFactory<&mut [u8]> {
    async fn get_writer<'a>(&'a mut self) -> Result<Box<dyn AsyncWrite + Unpin + 'a>> {
        self.0.set_position(0);
        Ok(Box::new(&mut self.0))
    }
}

impl Default for CursorWriterFactory<Vec<u8>> {
    fn default() -> Self {
        Self(Cursor::new(Vec::new()))
    }
}

impl CursorWriterFactory<Vec<u8>> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the factory, returning the downloaded bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.0.into_inner()
    }
}

impl<'a> CursorWriterFactory<&'a mut [u8]> {
    pub fn for_buf(inner: &'a mut [u8]) -> Self {
        Self(Cursor::new(inner))
    }

    /// How many bytes the download placed in the buffer; the object occupies the
    /// buffer's prefix of this length.
    pub fn size(self) -> usize {
        self.0.position() as usize
    }
}

/// A FileWriterFactory writes the download to a [tokio::fs::File].  Each attempt gets a
/// clone of the file ([File::try_clone()] must succeed), truncated and rewound, so a
/// retry discards any bytes a failed attempt wrote.
pub struct FileWriterFactory(File);

#[async_trait]
impl AsyncWriterFactory for FileWriterFactory {
    async fn get_writer<'a>(&'a mut self) -> Result<Box<dyn AsyncWrite + Unpin + 'a>> {
        let mut file = self.0.try_clone().await?;
        file.set_len(0).await?;
        file.seek(SeekFrom::Start(0)).await?;
        Ok(Box::new(file))
    }
}

impl FileWriterFactory {
    pub fn new(file: File) -> Self {
        Self(file)
    }

    /// Flush outstanding writes and hand the file back.  Its position afterward is
    /// unspecified; seek before reading.
    pub async fn into_inner(mut self) -> Result<File> {
        self.0.flush().await?;
        Ok(self.0)
    }
}
