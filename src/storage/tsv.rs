//! Tab-separated files for statistics tables and subscriber logs.

use crate::models::{StatisticsTable, SubscriberObservation, VideoRecord};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Timestamp format of `publish_time` and `dt` cells.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const STATISTICS_COLUMNS: [&str; 10] = [
    "channel_id",
    "channel_name",
    "subscriber_count",
    "video_id",
    "video_name",
    "publish_time",
    "view",
    "like",
    "dislike",
    "comment",
];

pub const OBSERVATION_HEADER: &str = "channel_id\tchannel_name\tdt\tsubscriber_count\n";

// ── Row shapes ────────────────────────────────────────────────────────────────

/// On-disk statistics row; field order is the canonical column order.
#[derive(Debug, Serialize, Deserialize)]
struct StatisticsRow {
    channel_id: String,
    channel_name: String,
    #[serde(deserialize_with = "lenient_count")]
    subscriber_count: u64,
    video_id: String,
    video_name: String,
    publish_time: String,
    #[serde(deserialize_with = "lenient_count")]
    view: u64,
    #[serde(deserialize_with = "lenient_count")]
    like: u64,
    #[serde(deserialize_with = "lenient_count")]
    dislike: u64,
    #[serde(deserialize_with = "lenient_count")]
    comment: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObservationRow {
    channel_id: String,
    channel_name: String,
    dt: String,
    #[serde(deserialize_with = "lenient_count")]
    subscriber_count: u64,
}

/// Counts written by older tooling may be blank or carry a `.0` suffix.
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<u64>()
        .or_else(|_| raw.parse::<f64>().map(|f| f.max(0.0) as u64))
        .map_err(|_| serde::de::Error::custom(format!("invalid count {:?}", raw)))
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
        .with_context(|| format!("Bad timestamp {:?}", s))
}

impl From<&VideoRecord> for StatisticsRow {
    fn from(r: &VideoRecord) -> Self {
        Self {
            channel_id: r.channel_id.clone(),
            channel_name: r.channel_name.clone(),
            subscriber_count: r.subscriber_count,
            video_id: r.video_id.clone(),
            video_name: r.title.clone(),
            publish_time: r.published_at.format(TIMESTAMP_FORMAT).to_string(),
            view: r.view,
            like: r.like,
            dislike: r.dislike,
            comment: r.comment,
        }
    }
}

impl TryFrom<StatisticsRow> for VideoRecord {
    type Error = anyhow::Error;

    fn try_from(row: StatisticsRow) -> Result<Self> {
        Ok(Self {
            published_at: parse_timestamp(&row.publish_time)?.and_utc(),
            channel_id: row.channel_id,
            channel_name: row.channel_name,
            subscriber_count: row.subscriber_count,
            video_id: row.video_id,
            title: row.video_name,
            view: row.view,
            like: row.like,
            dislike: row.dislike,
            comment: row.comment,
        })
    }
}

fn reader_for(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))
}

// ── Statistics table ──────────────────────────────────────────────────────────

/// Read a channel table. A missing file is the bootstrap case and yields an
/// empty table; so does a file with no header.
pub fn read_table(path: &Path) -> Result<StatisticsTable> {
    if !path.exists() {
        debug!("{:?} absent, starting from an empty table", path);
        return Ok(StatisticsTable::default());
    }

    let mut reader = reader_for(path)?;
    let mut rows = Vec::new();
    for (i, result) in reader.deserialize::<StatisticsRow>().enumerate() {
        let row = result.with_context(|| format!("Row {} in {:?}", i + 1, path))?;
        rows.push(VideoRecord::try_from(row).with_context(|| format!("Row {} in {:?}", i + 1, path))?);
    }

    debug!("{:?}: {} rows loaded", path, rows.len());
    Ok(StatisticsTable::new(rows))
}

/// Rewrite a channel table in canonical column order. An empty table is
/// written as an empty file, with no header.
pub fn write_table(path: &Path, table: &StatisticsTable) -> Result<()> {
    if table.is_empty() {
        std::fs::write(path, b"").with_context(|| format!("Failed to write {:?}", path))?;
        return Ok(());
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    writer.write_record(STATISTICS_COLUMNS)?;
    for record in &table.rows {
        writer.serialize(StatisticsRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

// ── Subscriber log ────────────────────────────────────────────────────────────

/// Append one observation, creating the log with its header first if needed.
pub fn append_observation(path: &Path, obs: &SubscriberObservation) -> Result<()> {
    let fresh = !path.exists();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {:?} for append", path))?;
    if fresh {
        file.write_all(OBSERVATION_HEADER.as_bytes())?;
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(file);
    writer.serialize(ObservationRow {
        channel_id: obs.channel_id.clone(),
        channel_name: obs.channel_name.clone(),
        dt: obs.observed_at.format(TIMESTAMP_FORMAT).to_string(),
        subscriber_count: obs.subscriber_count,
    })?;
    writer.flush()?;
    Ok(())
}

/// Read a whole subscriber log in file order. Unparseable rows are skipped.
pub fn read_observations(path: &Path) -> Result<Vec<SubscriberObservation>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = reader_for(path)?;
    let mut out = Vec::new();
    for (i, result) in reader.deserialize::<ObservationRow>().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                continue;
            }
        };
        match parse_timestamp(&row.dt) {
            Ok(observed_at) => out.push(SubscriberObservation {
                channel_id: row.channel_id,
                channel_name: row.channel_name,
                observed_at,
                subscriber_count: row.subscriber_count,
            }),
            Err(e) => warn!("Row {} in {:?}: {:#}", i + 1, path, e),
        }
    }
    Ok(out)
}
