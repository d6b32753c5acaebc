//! JSON payloads of the three Data API endpoints we read.
//!
//! Only the fields the sync needs are modelled; everything else is ignored.
//! Counters are sent as decimal strings and omitted entirely when zero or
//! hidden, so every counter is optional.

use serde::{Deserialize, Deserializer};

// ── channels.list ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChannelListResponse {
    /// Absent (not just empty) for unknown channels.
    pub items: Option<Vec<ChannelItem>>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelItem {
    pub id: String,
    pub snippet: ChannelSnippet,
    #[serde(rename = "contentDetails")]
    pub content_details: ChannelContentDetails,
    #[serde(default)]
    pub statistics: ChannelStatistics,
}

#[derive(Debug, Deserialize)]
pub struct ChannelSnippet {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
pub struct RelatedPlaylists {
    #[serde(default)]
    pub uploads: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelStatistics {
    #[serde(rename = "subscriberCount", default, deserialize_with = "count")]
    pub subscriber_count: Option<u64>,
}

// ── playlistItems.list ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PlaylistItemsPage {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItem {
    #[serde(rename = "contentDetails")]
    pub content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItemDetails {
    #[serde(rename = "videoId")]
    pub video_id: String,
}

// ── videos.list ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
pub struct VideoItem {
    pub id: String,
    pub snippet: VideoSnippet,
    #[serde(default)]
    pub statistics: VideoStatistics,
}

#[derive(Debug, Deserialize)]
pub struct VideoSnippet {
    pub title: String,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoStatistics {
    #[serde(rename = "viewCount", default, deserialize_with = "count")]
    pub view_count: Option<u64>,
    #[serde(rename = "likeCount", default, deserialize_with = "count")]
    pub like_count: Option<u64>,
    #[serde(rename = "dislikeCount", default, deserialize_with = "count")]
    pub dislike_count: Option<u64>,
    #[serde(rename = "commentCount", default, deserialize_with = "count")]
    pub comment_count: Option<u64>,
}

/// Accept `"123"`, `123` and `null`.
fn count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid count {:?}", s))),
    }
}
