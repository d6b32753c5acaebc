pub mod secrets;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,

    /// Channel identifiers to sync, in slice order.
    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub wiki: WikiConfig,
}

/// Video platform API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Usually injected by the secret resolver rather than written here.
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause between two page requests of the same uploads collection.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// 0 keeps the all-or-nothing behaviour: the first failed request aborts the run.
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Durable storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket_root")]
    pub bucket_root: PathBuf,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_statistics_prefix")]
    pub statistics_prefix: String,

    #[serde(default = "default_subscriber_count_prefix")]
    pub subscriber_count_prefix: String,

    /// Credential file read instead of the secret store in local mode.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
}

/// Secret store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecretsConfig {
    #[serde(default = "default_secrets_root")]
    pub root: PathBuf,

    /// Key name → secret reference.
    #[serde(default)]
    pub refs: HashMap<String, SecretRef>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SecretRef {
    pub name: String,
    #[serde(default = "default_secret_version")]
    pub version: String,
}

/// Wiki channel-id scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WikiConfig {
    #[serde(default = "default_wiki_base_url")]
    pub base_url: String,

    #[serde(default = "default_wiki_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_wiki_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_wiki_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_wiki_delay_ms")]
    pub delay_ms: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_api_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_page_delay_ms() -> u64 {
    100
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "yt-stats/0.1 (channel statistics sync)".to_string()
}
fn default_bucket_root() -> PathBuf {
    PathBuf::from("data/buckets")
}
fn default_bucket() -> String {
    "yt-stats".to_string()
}
fn default_statistics_prefix() -> String {
    "statistics_dir".to_string()
}
fn default_subscriber_count_prefix() -> String {
    "subscriber_count_dir".to_string()
}
fn default_credentials_path() -> PathBuf {
    PathBuf::from("secret/credentials.toml")
}
fn default_secrets_root() -> PathBuf {
    PathBuf::from("/var/run/secrets/yt-stats")
}
fn default_secret_version() -> String {
    "latest".to_string()
}
fn default_wiki_base_url() -> String {
    "https://wikiwiki.jp/nijisanji".to_string()
}
fn default_wiki_max_retries() -> u32 {
    5
}
fn default_wiki_backoff_base_ms() -> u64 {
    1000
}
fn default_wiki_timeout_secs() -> u64 {
    2
}
fn default_wiki_delay_ms() -> u64 {
    100
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            key: None,
            timeout_secs: default_timeout_secs(),
            page_delay_ms: default_page_delay_ms(),
            max_retries: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket_root: default_bucket_root(),
            bucket: default_bucket(),
            statistics_prefix: default_statistics_prefix(),
            subscriber_count_prefix: default_subscriber_count_prefix(),
            credentials_path: default_credentials_path(),
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            root: default_secrets_root(),
            refs: HashMap::new(),
        }
    }
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            base_url: default_wiki_base_url(),
            max_retries: default_wiki_max_retries(),
            backoff_base_ms: default_wiki_backoff_base_ms(),
            timeout_secs: default_wiki_timeout_secs(),
            delay_ms: default_wiki_delay_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            channels: Vec::new(),
            storage: StorageConfig::default(),
            secrets: SecretsConfig::default(),
            wiki: WikiConfig::default(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file(s) + environment overrides.
    ///
    /// Without an explicit path, `config/default.toml` and `config/local.toml`
    /// are layered when present. `YTSTATS__API__KEY` style variables win over
    /// both; `YTSTATS__CHANNELS` takes a comma-separated list.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Toml),
            ),
            None => builder
                .add_source(
                    config::File::with_name("config/default")
                        .required(false)
                        .format(config::FileFormat::Toml),
                )
                .add_source(
                    config::File::with_name("config/local")
                        .required(false)
                        .format(config::FileFormat::Toml),
                ),
        };

        let cfg = builder
            .add_source(
                config::Environment::with_prefix("YTSTATS")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("channels"),
            )
            .build()
            .context("Failed to read configuration")?;

        cfg.try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_keep_retries_off() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.api.max_retries, 0);
        assert_eq!(cfg.api.page_delay_ms, 100);
        assert_eq!(cfg.wiki.max_retries, 5);
        assert_eq!(cfg.storage.statistics_prefix, "statistics_dir");
    }

    #[test]
    fn load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
channels = ["UCaaa", "UCbbb", "legacyname"]

[api]
page_delay_ms = 0

[storage]
bucket = "stats-bucket"

[secrets.refs.youtube_data_api_key]
name = "yt-key"
version = "3"
"#
        )
        .unwrap();

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.channels, vec!["UCaaa", "UCbbb", "legacyname"]);
        assert_eq!(cfg.api.page_delay_ms, 0);
        assert_eq!(cfg.api.timeout_secs, 30);
        assert_eq!(cfg.storage.bucket, "stats-bucket");
        assert_eq!(
            cfg.secrets.refs.get("youtube_data_api_key"),
            Some(&SecretRef { name: "yt-key".into(), version: "3".into() })
        );
    }
}
