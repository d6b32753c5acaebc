//! Injects API credentials into the configuration at load time.
//!
//! In the cloud the secrets are mounted as files, one per reference, at
//! `{root}/{name}/{version}`. Outside of it a single TOML credential file
//! with `key = "value"` pairs is read instead.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, info};

use super::{AppConfig, SecretRef};

/// Key under which the platform API key is published by the secret store.
pub const API_KEY_NAME: &str = "youtube_data_api_key";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Failed to read secret {name} (version {version}) at {path:?}: {source}")]
    Read {
        name: String,
        version: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid credential file {path:?}: {source}")]
    CredentialFile {
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("Secret {0} is empty")]
    Empty(String),

    #[error("No API key configured: set api.key or a youtube_data_api_key secret")]
    MissingApiKey,
}

/// Where secret values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    SecretStore,
    LocalFile,
}

impl CredentialSource {
    pub fn for_local(local: bool) -> Self {
        if local {
            CredentialSource::LocalFile
        } else {
            CredentialSource::SecretStore
        }
    }
}

/// Read every referenced secret from the mounted store.
pub fn read_secret_store(
    root: &Path,
    refs: &HashMap<String, SecretRef>,
) -> Result<HashMap<String, String>, SecretError> {
    let mut out = HashMap::with_capacity(refs.len());
    for (key, secret) in refs {
        let path = root.join(&secret.name).join(&secret.version);
        let raw = std::fs::read_to_string(&path).map_err(|source| SecretError::Read {
            name: secret.name.clone(),
            version: secret.version.clone(),
            path: path.clone(),
            source,
        })?;
        let value = raw.trim();
        if value.is_empty() {
            return Err(SecretError::Empty(secret.name.clone()));
        }
        debug!("Loaded secret {} for {}", secret.name, key);
        out.insert(key.clone(), value.to_string());
    }
    Ok(out)
}

/// Read a flat TOML table of credentials.
pub fn read_credential_file(path: &Path) -> Result<HashMap<String, String>, SecretError> {
    let to_err = |source| SecretError::CredentialFile {
        path: path.to_path_buf(),
        source,
    };
    config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Toml))
        .build()
        .map_err(to_err)?
        .try_deserialize::<HashMap<String, String>>()
        .map_err(to_err)
}

/// Resolve the API key for this run.
///
/// A key found through `source` overrides `api.key` from the configuration.
pub fn resolve_api_key(
    config: &AppConfig,
    source: CredentialSource,
) -> Result<SecretString, SecretError> {
    let mut resolved = match source {
        CredentialSource::SecretStore if config.secrets.refs.is_empty() => HashMap::new(),
        CredentialSource::SecretStore => {
            read_secret_store(&config.secrets.root, &config.secrets.refs)?
        }
        CredentialSource::LocalFile => read_credential_file(&config.storage.credentials_path)?,
    };

    if let Some(key) = resolved.remove(API_KEY_NAME) {
        info!("API key resolved from {:?}", source);
        return Ok(SecretString::from(key));
    }

    match config.api.key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(SecretString::from(key.to_string())),
        _ => Err(SecretError::MissingApiKey),
    }
}
