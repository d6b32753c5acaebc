use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name recorded when a channel cannot be resolved.
pub const ERROR_CHANNEL_NAME: &str = "ERROR";

// ── Channel ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub subscriber_count: u64,
    pub uploads_id: String, // empty for the sentinel
}

impl Channel {
    /// Stand-in for a channel the platform does not know about.
    pub fn sentinel(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: ERROR_CHANNEL_NAME.to_string(),
            subscriber_count: 0,
            uploads_id: String::new(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.name == ERROR_CHANNEL_NAME && self.uploads_id.is_empty()
    }
}

// ── Video statistics ──────────────────────────────────────────────────────────

/// One video as returned by the batch lookup, before channel data is attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchedVideo {
    pub video_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub view: u64,
    pub like: u64,
    pub dislike: u64,
    pub comment: u64,
}

/// A row of a channel's statistics table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoRecord {
    pub channel_id: String,
    pub channel_name: String,
    pub subscriber_count: u64,
    pub video_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub view: u64,
    pub like: u64,
    pub dislike: u64,
    pub comment: u64,
}

impl VideoRecord {
    /// Attach the channel snapshot taken at fetch time.
    pub fn stamped(channel: &Channel, video: FetchedVideo) -> Self {
        Self {
            channel_id: channel.id.clone(),
            channel_name: channel.name.clone(),
            subscriber_count: channel.subscriber_count,
            video_id: video.video_id,
            title: video.title,
            published_at: video.published_at,
            view: video.view,
            like: video.like,
            dislike: video.dislike,
            comment: video.comment,
        }
    }
}

/// Per-channel table, unique by `video_id` and ordered by publish time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticsTable {
    pub rows: Vec<VideoRecord>,
}

impl StatisticsTable {
    pub fn new(rows: Vec<VideoRecord>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

// ── Subscriber time series ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriberObservation {
    pub channel_id: String,
    pub channel_name: String,
    pub observed_at: NaiveDateTime, // local wall-clock time
    pub subscriber_count: u64,
}

impl SubscriberObservation {
    pub fn of(channel: &Channel, observed_at: NaiveDateTime) -> Self {
        Self {
            channel_id: channel.id.clone(),
            channel_name: channel.name.clone(),
            observed_at,
            subscriber_count: channel.subscriber_count,
        }
    }
}
