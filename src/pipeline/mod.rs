//! Sync orchestrator: ties platform → reconciliation → storage together.
//!
//! ## Run shape
//!
//! 1. Pull every known object from the bucket into a staging directory.
//! 2. For each channel in the requested slice, strictly one after another:
//!    resolve → list uploads → fetch statistics → merge → write table →
//!    append subscriber observation, uploading both files right away.
//!
//! The first error aborts the remaining channels. Channels finished before
//! it stay committed.

pub mod invocation;

use crate::config::AppConfig;
use crate::platform::batch::{fetch_videos, sort_by_published};
use crate::platform::uploads::list_upload_ids;
use crate::platform::{resolve_channel, VideoPlatform};
use crate::reconcile::reconcile;
use crate::storage::{ObjectStore, Staging};
use crate::utils::Timer;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::time::Duration;
use tracing::info;

pub use self::invocation::Invocation;

/// Literal returned to the trigger on success.
pub const ACK: &str = "OK";

pub struct Pipeline {
    config: AppConfig,
    platform: Box<dyn VideoPlatform>,
    store: Box<dyn ObjectStore>,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        platform: Box<dyn VideoPlatform>,
        store: Box<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            platform,
            store,
        }
    }

    pub async fn run(&self, invocation: &Invocation) -> Result<SyncStats> {
        // One timestamp for every observation of this invocation.
        self.run_at(invocation, Local::now().naive_local()).await
    }

    pub async fn run_at(
        &self,
        invocation: &Invocation,
        observed_at: NaiveDateTime,
    ) -> Result<SyncStats> {
        let channels = invocation.slice(&self.config.channels);
        info!(
            "=== Syncing {} of {} channels (slice {}..{}) ===",
            channels.len(),
            self.config.channels.len(),
            invocation.begin,
            invocation
                .end
                .map(|e| e.to_string())
                .unwrap_or_default()
        );

        let staging = Staging::new(&self.config.storage)?;
        staging
            .pull(self.store.as_ref())
            .context("Bucket download failed")?;

        let mut stats = SyncStats::default();
        for channel_id in channels {
            let report = self
                .sync_channel(&staging, channel_id, observed_at)
                .await
                .with_context(|| format!("sync of channel {} failed", channel_id))?;
            stats.record(&report);
        }

        info!(
            "=== Done: {} channels | {} videos fetched | {} rows written ({} new) ===",
            stats.channels_processed, stats.videos_fetched, stats.rows_written, stats.rows_inserted
        );
        Ok(stats)
    }

    async fn sync_channel(
        &self,
        staging: &Staging,
        channel_id: &str,
        observed_at: NaiveDateTime,
    ) -> Result<ChannelReport> {
        let _t = Timer::start(format!("channel {}", channel_id));
        let platform = self.platform.as_ref();
        let delay = Duration::from_millis(self.config.api.page_delay_ms);

        let existing = staging.load_table(channel_id)?;

        let channel = resolve_channel(platform, channel_id).await?;
        if channel.is_sentinel() {
            info!("{}: unresolved, recording an empty fetch", channel_id);
        }
        let video_ids = list_upload_ids(platform, &channel.uploads_id, delay)
            .await
            .context("Uploads listing failed")?;
        let mut videos = fetch_videos(platform, &video_ids)
            .await
            .context("Video statistics fetch failed")?;
        sort_by_published(&mut videos);
        let fetched = videos.len();

        let merged = reconcile(existing, &channel, videos, observed_at);
        staging.commit_table(self.store.as_ref(), channel_id, &merged.table)?;
        staging.commit_observation(self.store.as_ref(), channel_id, &merged.observation)?;

        info!(
            "{}: {} ids listed, {} fetched, table now {} rows ({} new)",
            channel_id,
            video_ids.len(),
            fetched,
            merged.table.len(),
            merged.inserted
        );

        Ok(ChannelReport {
            videos_fetched: fetched,
            rows_written: merged.table.len(),
            rows_inserted: merged.inserted,
        })
    }
}

#[derive(Debug)]
struct ChannelReport {
    videos_fetched: usize,
    rows_written: usize,
    rows_inserted: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub channels_processed: usize,
    pub videos_fetched: usize,
    pub rows_written: usize,
    pub rows_inserted: usize,
}

impl SyncStats {
    fn record(&mut self, report: &ChannelReport) {
        self.channels_processed += 1;
        self.videos_fetched += report.videos_fetched;
        self.rows_written += report.rows_written;
        self.rows_inserted += report.rows_inserted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use crate::storage::tsv::{read_observations, read_table};
    use crate::storage::DirBucket;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn config(channels: &[&str]) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.channels = channels.iter().map(|s| s.to_string()).collect();
        cfg.api.page_delay_ms = 0;
        cfg
    }

    fn demo_platform() -> FakePlatform {
        FakePlatform::default()
            .with_channel("UCabc", "Demo", 1000, "UUabc")
            .with_page("UUabc", &["v1", "v2"], None)
            .with_video("v2", "2021-05-02T00:00:00Z", json!({"viewCount": "20"}))
            .with_video(
                "v1",
                "2021-05-01T00:00:00Z",
                json!({"viewCount": "10", "likeCount": "1", "dislikeCount": "0", "commentCount": "2"}),
            )
    }

    fn all(payload: &str) -> Invocation {
        payload.parse().unwrap()
    }

    fn bucket_file(bucket: &Path, name: &str) -> std::path::PathBuf {
        bucket.join(name)
    }

    #[tokio::test]
    async fn end_to_end_demo_channel() {
        let bucket = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            config(&["UCabc"]),
            Box::new(demo_platform()),
            Box::new(DirBucket::at(bucket.path())),
        );

        let stats = pipeline.run_at(&all("0-"), now()).await.unwrap();
        assert_eq!(
            stats,
            SyncStats {
                channels_processed: 1,
                videos_fetched: 2,
                rows_written: 2,
                rows_inserted: 2,
            }
        );

        let table = read_table(&bucket_file(bucket.path(), "statistics_dir@UCabc.tsv")).unwrap();
        let summary: Vec<_> = table
            .rows
            .iter()
            .map(|r| (r.video_id.as_str(), r.channel_id.as_str(), r.subscriber_count, r.view, r.like))
            .collect();
        assert_eq!(summary, vec![("v1", "UCabc", 1000, 10, 1), ("v2", "UCabc", 1000, 20, 0)]);
        assert_eq!((table.rows[1].dislike, table.rows[1].comment), (0, 0));

        let log = read_observations(&bucket_file(bucket.path(), "subscriber_count_dir@UCabc.tsv"))
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].subscriber_count, 1000);
        assert_eq!(log[0].observed_at, now());
    }

    #[tokio::test]
    async fn second_run_refreshes_rows_and_appends_log() {
        let bucket = tempfile::tempdir().unwrap();
        let first = Pipeline::new(
            config(&["UCabc"]),
            Box::new(demo_platform()),
            Box::new(DirBucket::at(bucket.path())),
        );
        first.run_at(&all("0"), now()).await.unwrap();

        // v1 disappeared upstream, v2 gained views, v3 is new.
        let platform = FakePlatform::default()
            .with_channel("UCabc", "Demo", 1100, "UUabc")
            .with_page("UUabc", &["v2", "v3"], None)
            .with_video("v2", "2021-05-02T00:00:00Z", json!({"viewCount": "25"}))
            .with_video("v3", "2021-05-03T00:00:00Z", json!({}));
        let second = Pipeline::new(
            config(&["UCabc"]),
            Box::new(platform),
            Box::new(DirBucket::at(bucket.path())),
        );
        let stats = second.run_at(&all("0"), now()).await.unwrap();
        assert_eq!((stats.rows_written, stats.rows_inserted), (3, 1));

        let table = read_table(&bucket_file(bucket.path(), "statistics_dir@UCabc.tsv")).unwrap();
        let summary: Vec<_> = table
            .rows
            .iter()
            .map(|r| (r.video_id.as_str(), r.view, r.subscriber_count))
            .collect();
        assert_eq!(summary, vec![("v1", 10, 1000), ("v2", 25, 1100), ("v3", 0, 1100)]);

        let log = read_observations(&bucket_file(bucket.path(), "subscriber_count_dir@UCabc.tsv"))
            .unwrap();
        let counts: Vec<_> = log.iter().map(|o| o.subscriber_count).collect();
        assert_eq!(counts, vec![1000, 1100]);
    }

    #[tokio::test]
    async fn unknown_channel_records_sentinel() {
        let bucket = tempfile::tempdir().unwrap();
        let platform = FakePlatform::default();
        let pipeline = Pipeline::new(
            config(&["UCgone"]),
            Box::new(platform),
            Box::new(DirBucket::at(bucket.path())),
        );

        let stats = pipeline.run_at(&all("0"), now()).await.unwrap();
        assert_eq!(stats.videos_fetched, 0);

        let table = read_table(&bucket_file(bucket.path(), "statistics_dir@UCgone.tsv")).unwrap();
        assert!(table.is_empty());
        let log = read_observations(&bucket_file(bucket.path(), "subscriber_count_dir@UCgone.tsv"))
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].channel_name, "ERROR");
        assert_eq!(log[0].subscriber_count, 0);
    }

    #[tokio::test]
    async fn failure_aborts_remaining_channels_but_keeps_earlier_ones() {
        let bucket = tempfile::tempdir().unwrap();
        // UCbad lists a video, but the video batch request fails.
        let platform = FakePlatform {
            fail_videos: true,
            ..FakePlatform::default()
                .with_channel("UCgone2", "x", 1, "")
                .with_channel("UCbad", "Bad", 5, "UUbad")
                .with_page("UUbad", &["v9"], None)
                .with_channel("UCabc", "Demo", 1000, "UUabc")
        };
        let pipeline = Pipeline::new(
            config(&["UCgone2", "UCbad", "UCabc"]),
            Box::new(platform),
            Box::new(DirBucket::at(bucket.path())),
        );

        let err = pipeline.run_at(&all("0"), now()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("UCbad"));

        let store = DirBucket::at(bucket.path());
        let names = store.list().unwrap();
        assert_eq!(
            names,
            vec!["statistics_dir@UCgone2.tsv", "subscriber_count_dir@UCgone2.tsv"]
        );
    }

    #[tokio::test]
    async fn failed_page_leaves_channel_uncommitted() {
        let bucket = tempfile::tempdir().unwrap();
        let platform = FakePlatform {
            fail_pages: true,
            ..demo_platform()
                .with_channel("UCpaged", "Paged", 7, "UUpaged")
                .with_page("UUpaged", &["p1"], Some("A"))
                .with_page("UUpaged", &["p2"], None)
        };
        let pipeline = Pipeline::new(
            config(&["UCabc", "UCpaged"]),
            Box::new(platform),
            Box::new(DirBucket::at(bucket.path())),
        );

        let err = pipeline.run_at(&all("0"), now()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("UCpaged"));

        let names = DirBucket::at(bucket.path()).list().unwrap();
        assert_eq!(
            names,
            vec!["statistics_dir@UCabc.tsv", "subscriber_count_dir@UCabc.tsv"]
        );
    }

    #[tokio::test]
    async fn only_the_requested_slice_runs() {
        let bucket = tempfile::tempdir().unwrap();
        let platform = demo_platform().with_channel("UCzzz", "Other", 3, "");
        let pipeline = Pipeline::new(
            config(&["UCzzz", "UCabc", "UCnever"]),
            Box::new(platform),
            Box::new(DirBucket::at(bucket.path())),
        );

        let stats = pipeline.run_at(&all("0-2"), now()).await.unwrap();
        assert_eq!(stats.channels_processed, 2);
        assert!(!bucket_file(bucket.path(), "statistics_dir@UCnever.tsv").exists());
    }
}
