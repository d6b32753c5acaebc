use crate::models::{Channel, FetchedVideo};
use chrono::{DateTime, NaiveDateTime, Utc};

use super::http_client::PlatformError;
use super::responses::{ChannelItem, VideoItem};

/// Format the platform uses for `publishedAt`.
pub const PUBLISHED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse `publishedAt`: "2021-03-04T05:06:07Z".
/// Fractional seconds or an explicit offset fall back to RFC 3339.
pub fn parse_published_at(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, PUBLISHED_AT_FORMAT)
        .map(|dt| dt.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

// ── Item → model ──────────────────────────────────────────────────────────────

/// Build a `Channel` keyed by the identifier the caller asked for, which may
/// be a legacy username rather than the canonical id.
pub fn clean_channel(requested_id: &str, item: ChannelItem) -> Channel {
    Channel {
        id: requested_id.to_string(),
        name: item.snippet.title,
        subscriber_count: item.statistics.subscriber_count.unwrap_or(0),
        uploads_id: item.content_details.related_playlists.uploads,
    }
}

/// Missing counters mean zero.
pub fn clean_video(item: VideoItem) -> Result<FetchedVideo, PlatformError> {
    let published_at = parse_published_at(&item.snippet.published_at).ok_or_else(|| {
        PlatformError::Decode(format!(
            "video {}: bad publishedAt {:?}",
            item.id, item.snippet.published_at
        ))
    })?;
    let stats = item.statistics;

    Ok(FetchedVideo {
        video_id: item.id,
        title: item.snippet.title,
        published_at,
        view: stats.view_count.unwrap_or(0),
        like: stats.like_count.unwrap_or(0),
        dislike: stats.dislike_count.unwrap_or(0),
        comment: stats.comment_count.unwrap_or(0),
    })
}
