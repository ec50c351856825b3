//! The round trip: probe, upload when absent, download, verify.
use crate::settings::Settings;
use anyhow::{bail, Context, Result};
use s3stash::{Bucket, ClientBuilder, Retry};
use s3stash_download::{download_to_file, hashing};
use s3stash_upload::upload_from_file;
use std::path::Path;
use tokio::fs::File;

const CONTENT_TYPE: &str = "application/octet-stream";

/// Perform the round trip for one file.  The object is uploaded only when no object
/// with the item name exists; the download always happens, into the destination
/// directory.  When this run performed the upload, the downloaded file is verified
/// against the source by SHA-256.
pub async fn run(
    settings: &Settings,
    bucket_name: &str,
    file_name: &str,
    item_name: Option<&str>,
) -> Result<()> {
    let source_path = settings.source_dir.join(file_name);
    if !source_path.is_file() {
        bail!("source file {} does not exist", source_path.display());
    }

    let item_name = match item_name {
        Some(item_name) => item_name.to_string(),
        None => Path::new(file_name)
            .file_name()
            .with_context(|| format!("file name {} has no final component", file_name))?
            .to_string_lossy()
            .into_owned(),
    };

    let mut builder =
        ClientBuilder::new(&settings.region).credentials(settings.credentials.clone());
    if let Some(endpoint_url) = &settings.endpoint_url {
        builder = builder.endpoint_url(endpoint_url);
    }
    let bucket = Bucket::new(builder, bucket_name)?;
    let retry = Retry::default();

    let mut uploaded = false;
    if bucket.exists(&item_name).await? {
        log::warn!(
            "object s3://{}/{} already exists; skipping upload",
            bucket_name,
            item_name
        );
    } else {
        log::info!(
            "uploading {} to s3://{}/{}",
            source_path.display(),
            bucket_name,
            item_name
        );
        let source_file = File::open(&source_path)
            .await
            .with_context(|| format!("opening {}", source_path.display()))?;
        upload_from_file(&item_name, CONTENT_TYPE, source_file, &retry, &bucket).await?;
        uploaded = true;
    }

    let dest_path = settings.dest_dir.join(&item_name);
    if let Some(parent) = dest_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    log::info!(
        "downloading s3://{}/{} to {}",
        bucket_name,
        item_name,
        dest_path.display()
    );
    let dest_file = File::create(&dest_path)
        .await
        .with_context(|| format!("creating {}", dest_path.display()))?;
    let (_, meta) = download_to_file(&item_name, &retry, &bucket, dest_file).await?;
    log::info!("downloaded {} bytes", meta.content_length);

    if uploaded {
        let source_hash = hashing::sha256_hex_of_path(&source_path).await?;
        let dest_hash = hashing::sha256_hex_of_path(&dest_path).await?;
        if source_hash != dest_hash {
            bail!(
                "downloaded file {} does not match the uploaded source {}",
                dest_path.display(),
                source_path.display()
            );
        }
        log::info!("verified: source and downloaded SHA-256 match ({})", source_hash);
    } else {
        // the remote object is authoritative when the upload was skipped
        let source_len = tokio::fs::metadata(&source_path).await?.len();
        log::info!(
            "upload was skipped; local source is {} bytes, downloaded object is {} bytes",
            source_len,
            meta.content_length
        );
    }

    Ok(())
}
