//! Content hashing for post-transfer verification.
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const CHUNK_SIZE: usize = 8192;

/// SHA-256 of an in-memory buffer, as a lowercase hex string.
pub fn sha256_hex_of_buf(buf: &[u8]) -> String {
    format!("{:x}", Sha256::digest(buf))
}

/// SHA-256 of a file's full contents, as a lowercase hex string.  The file is read in
/// fixed-size chunks, hashing only the bytes actually read from each chunk.  The file
/// position is unspecified afterwards.
pub async fn sha256_hex_of_file(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0)).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 of the file at the given path, as a lowercase hex string.
pub async fn sha256_hex_of_path(path: impl AsRef<Path>) -> Result<String> {
    let mut file = File::open(path).await?;
    sha256_hex_of_file(&mut file).await
}
