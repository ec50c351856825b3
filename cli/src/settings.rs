//! Layered configuration for the s3stash binary.
//!
//! Values are merged from four sources, lowest to highest precedence: the JSON
//! settings file, the JSON secrets file from the user configuration directory, the
//! `S3STASH_*` environment variables, and the command line.
use crate::args::Args;
use anyhow::{bail, Context, Result};
use s3stash::Credentials;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Settings file looked for in the working directory when `--settings` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "s3stash.json";

/// Fully resolved configuration for a round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub credentials: Credentials,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
}

/// The values one configuration source may provide.  Every field is optional; the
/// sources are merged before any requirement is enforced.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartialSettings {
    access_key: Option<String>,
    secret_key: Option<String>,
    session_token: Option<String>,
    region: Option<String>,
    endpoint_url: Option<String>,
    source_dir: Option<PathBuf>,
    dest_dir: Option<PathBuf>,
}

impl PartialSettings {
    /// Merge in a higher-precedence source: its values win wherever it has any.
    fn overridden_by(self, higher: PartialSettings) -> PartialSettings {
        PartialSettings {
            access_key: higher.access_key.or(self.access_key),
            secret_key: higher.secret_key.or(self.secret_key),
            session_token: higher.session_token.or(self.session_token),
            region: higher.region.or(self.region),
            endpoint_url: higher.endpoint_url.or(self.endpoint_url),
            source_dir: higher.source_dir.or(self.source_dir),
            dest_dir: higher.dest_dir.or(self.dest_dir),
        }
    }
}

/// Resolve the configuration for the given command line.  A file named by an explicit
/// `--settings` / `--secrets` flag must exist; the default files are optional.  A file
/// that exists but does not parse is an error regardless.
pub fn resolve(args: &Args) -> Result<Settings> {
    let mut merged = PartialSettings::default();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    merged = merged.overridden_by(from_file(&settings_path, args.settings.is_some())?);

    let secrets_path = args.secrets.clone().or_else(default_secrets_path);
    if let Some(secrets_path) = secrets_path {
        merged = merged.overridden_by(from_file(&secrets_path, args.secrets.is_some())?);
    }

    merged = merged.overridden_by(from_env());
    merged = merged.overridden_by(from_args(args));

    let access_key = merged
        .access_key
        .context("accessKey is not set in any configuration source")?;
    let secret_key = merged
        .secret_key
        .context("secretKey is not set in any configuration source")?;
    let region = merged
        .region
        .context("region is not set in any configuration source")?;
    let dest_dir = merged
        .dest_dir
        .context("destDir is not set in any configuration source")?;

    Ok(Settings {
        credentials: Credentials {
            access_key,
            secret_key,
            session_token: merged.session_token,
        },
        region,
        endpoint_url: merged.endpoint_url,
        source_dir: merged.source_dir.unwrap_or_else(|| PathBuf::from(".")),
        dest_dir,
    })
}

/// The default location of the secrets file, under the user configuration directory
/// (`~/.config/s3stash/secrets.json` on Linux).  None when no such directory exists.
fn default_secrets_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("s3stash").join("secrets.json"))
}

fn from_file(path: &Path, required: bool) -> Result<PartialSettings> {
    if !path.exists() {
        if required {
            bail!("settings file {} does not exist", path.display());
        }
        return Ok(PartialSettings::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing settings file {}", path.display()))
}

fn from_env() -> PartialSettings {
    PartialSettings {
        access_key: env_opt("S3STASH_ACCESS_KEY"),
        secret_key: env_opt("S3STASH_SECRET_KEY"),
        session_token: env_opt("S3STASH_SESSION_TOKEN"),
        region: env_opt("S3STASH_REGION"),
        endpoint_url: env_opt("S3STASH_ENDPOINT_URL"),
        source_dir: env_opt("S3STASH_SOURCE_DIR").map(PathBuf::from),
        dest_dir: env_opt("S3STASH_DEST_DIR").map(PathBuf::from),
    }
}

fn from_args(args: &Args) -> PartialSettings {
    PartialSettings {
        access_key: args.access_key.clone(),
        secret_key: args.secret_key.clone(),
        session_token: args.session_token.clone(),
        region: args.region.clone(),
        endpoint_url: args.endpoint_url.clone(),
        source_dir: args.source_dir.clone(),
        dest_dir: args.dest_dir.clone(),
    }
}

/// Read an environment variable, treating an unset or empty variable as None.
fn env_opt(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if value.is_empty() => None,
        Ok(value) => Some(value),
        Err(_) => None,
    }
}
