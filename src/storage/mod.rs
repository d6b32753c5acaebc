pub mod tsv;

use crate::config::StorageConfig;
use crate::models::{StatisticsTable, SubscriberObservation};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Separator between prefix and file name in object names.
pub const SEP: char = '@';

// ── Object naming ─────────────────────────────────────────────────────────────

/// `statistics_dir` + `UCabc.tsv` → `statistics_dir@UCabc.tsv`
pub fn object_name(prefix: &str, file_name: &str) -> String {
    format!("{}{}{}", prefix, SEP, file_name)
}

/// Inverse of [`object_name`]; `None` unless the name has exactly one `@`.
pub fn split_object_name(name: &str) -> Option<(&str, &str)> {
    let mut parts = name.split(SEP);
    let prefix = parts.next()?;
    let file = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((prefix, file))
}

pub fn channel_file_name(channel_id: &str) -> String {
    format!("{}.tsv", channel_id)
}

// ── Object store ──────────────────────────────────────────────────────────────

/// Flat, bucket-like durable storage.
pub trait ObjectStore {
    fn list(&self) -> Result<Vec<String>>;
    fn download(&self, name: &str, dest: &Path) -> Result<()>;
    fn upload(&self, src: &Path, name: &str) -> Result<()>;
}

/// A bucket backed by a directory: every object is a file directly inside it.
pub struct DirBucket {
    root: PathBuf,
}

impl DirBucket {
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let bucket = Self::at(config.bucket_root.join(&config.bucket));
        std::fs::create_dir_all(&bucket.root)
            .with_context(|| format!("Could not create bucket dir {:?}", bucket.root))?;
        Ok(bucket)
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ObjectStore for DirBucket {
    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list {:?}", self.root))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn download(&self, name: &str, dest: &Path) -> Result<()> {
        std::fs::copy(self.root.join(name), dest)
            .with_context(|| format!("download {} → {:?}", name, dest))?;
        Ok(())
    }

    fn upload(&self, src: &Path, name: &str) -> Result<()> {
        std::fs::copy(src, self.root.join(name))
            .with_context(|| format!("upload {:?} → {}", src, name))?;
        Ok(())
    }
}

// ── Staging area ──────────────────────────────────────────────────────────────

/// Temporary local mirror of the bucket for one invocation.
///
/// Objects are pulled once at the start, edited in place per channel, and
/// pushed back channel by channel so a later failure keeps earlier results.
pub struct Staging {
    dir: TempDir,
    statistics_prefix: String,
    subscriber_prefix: String,
}

impl Staging {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let dir = tempfile::tempdir().context("Failed to create staging dir")?;
        for prefix in [&config.statistics_prefix, &config.subscriber_count_prefix] {
            std::fs::create_dir_all(dir.path().join(prefix))?;
        }
        Ok(Self {
            dir,
            statistics_prefix: config.statistics_prefix.clone(),
            subscriber_prefix: config.subscriber_count_prefix.clone(),
        })
    }

    fn knows_prefix(&self, prefix: &str) -> bool {
        prefix == self.statistics_prefix || prefix == self.subscriber_prefix
    }

    /// Download every `{prefix}@{file}` object with a known prefix.
    pub fn pull(&self, store: &dyn ObjectStore) -> Result<usize> {
        let mut pulled = 0usize;
        for name in store.list()? {
            let Some((prefix, file)) = split_object_name(&name) else {
                continue;
            };
            if !self.knows_prefix(prefix) || file.is_empty() {
                continue;
            }
            store.download(&name, &self.dir.path().join(prefix).join(file))?;
            debug!("download: {}", name);
            pulled += 1;
        }
        info!("Pulled {} objects into staging", pulled);
        Ok(pulled)
    }

    pub fn table_path(&self, channel_id: &str) -> PathBuf {
        self.dir
            .path()
            .join(&self.statistics_prefix)
            .join(channel_file_name(channel_id))
    }

    pub fn log_path(&self, channel_id: &str) -> PathBuf {
        self.dir
            .path()
            .join(&self.subscriber_prefix)
            .join(channel_file_name(channel_id))
    }

    pub fn load_table(&self, channel_id: &str) -> Result<StatisticsTable> {
        tsv::read_table(&self.table_path(channel_id))
    }

    /// Rewrite the staged table and upload it.
    pub fn commit_table(
        &self,
        store: &dyn ObjectStore,
        channel_id: &str,
        table: &StatisticsTable,
    ) -> Result<()> {
        let path = self.table_path(channel_id);
        tsv::write_table(&path, table)?;
        store.upload(
            &path,
            &object_name(&self.statistics_prefix, &channel_file_name(channel_id)),
        )
    }

    /// Append to the staged log and upload it.
    pub fn commit_observation(
        &self,
        store: &dyn ObjectStore,
        channel_id: &str,
        obs: &SubscriberObservation,
    ) -> Result<()> {
        let path = self.log_path(channel_id);
        tsv::append_observation(&path, obs)?;
        store.upload(
            &path,
            &object_name(&self.subscriber_prefix, &channel_file_name(channel_id)),
        )
    }

    /// Every staged subscriber log, keyed by file stem.
    pub fn observation_logs(&self) -> Result<Vec<(String, Vec<SubscriberObservation>)>> {
        let dir = self.dir.path().join(&self.subscriber_prefix);
        let mut logs = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "tsv").unwrap_or(false) {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                logs.push((stem, tsv::read_observations(&path)?));
            }
        }
        logs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(logs)
    }
}
