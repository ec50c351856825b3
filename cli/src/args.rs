use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;

/// Stash a local file in an object-storage bucket, then fetch it back.
///
/// The upload is skipped when an object with the item name already exists; the
/// download always happens, writing to the destination directory.
#[derive(Parser, Debug)]
#[command(name = "s3stash", version)]
pub struct Args {
    /// Name of the bucket to stash into
    #[arg(short = 'b', long)]
    pub bucket_name: String,

    /// Name of the file to upload, relative to the source directory
    #[arg(short = 'f', long)]
    pub file_name: String,

    /// Key under which to store the object (default: the file name's final component)
    #[arg(short = 'i', long)]
    pub item_name: Option<String>,

    /// Access key, overriding the settings files and environment
    #[arg(long, value_name = "KEY")]
    pub access_key: Option<String>,

    /// Secret key, overriding the settings files and environment
    #[arg(long, value_name = "KEY")]
    pub secret_key: Option<String>,

    /// Session token, for temporary credentials
    #[arg(long, value_name = "TOKEN")]
    pub session_token: Option<String>,

    /// Region of the bucket
    #[arg(long)]
    pub region: Option<String>,

    /// URL of an S3-compatible deployment, instead of AWS itself
    #[arg(long, value_name = "URL")]
    pub endpoint_url: Option<String>,

    /// Directory containing the file to upload (default: the working directory)
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Directory to download into
    #[arg(long, value_name = "DIR")]
    pub dest_dir: Option<PathBuf>,

    /// Path to the JSON settings file (default: ./s3stash.json, if present)
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Path to the JSON secrets file (default: s3stash/secrets.json under the
    /// user configuration directory, if present)
    #[arg(long, value_name = "FILE")]
    pub secrets: Option<PathBuf>,
}

impl Args {
    /// Parse the command line, exiting the process on error.  Usage errors print a
    /// message and exit with code 1 (rather than clap's default 2); `--help` and
    /// `--version` exit with code 0.
    pub fn parse_or_exit() -> Args {
        match Args::try_parse() {
            Ok(args) => args,
            Err(err) => {
                let code = match err.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                    _ => 1,
                };
                err.print().ok();
                std::process::exit(code);
            }
        }
    }
}
