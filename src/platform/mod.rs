pub mod batch;
pub mod cleaner;
pub mod http_client;
pub mod responses;
pub mod uploads;

use crate::config::ApiConfig;
use crate::models::Channel;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use self::cleaner::clean_channel;
use self::http_client::{ClientSettings, HttpClient, PlatformError, RetryPolicy};
use self::responses::{ChannelItem, ChannelListResponse, PlaylistItemsPage, VideoListResponse};

/// Largest id list / page size the platform accepts per request.
pub const MAX_PAGE_SIZE: usize = 50;

/// Prefix shared by every canonical channel id.
const CHANNEL_ID_PREFIX: &str = "UC";

// ── Source trait ──────────────────────────────────────────────────────────────

/// How a channel is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelLookup<'a> {
    Id(&'a str),
    Username(&'a str),
}

impl<'a> ChannelLookup<'a> {
    /// Canonical ids start with `UC`; anything else is a legacy username.
    pub fn for_identifier(identifier: &'a str) -> Self {
        if identifier.starts_with(CHANNEL_ID_PREFIX) {
            ChannelLookup::Id(identifier)
        } else {
            ChannelLookup::Username(identifier)
        }
    }
}

/// The three read endpoints the sync depends on.
#[async_trait]
pub trait VideoPlatform: Send + Sync {
    /// `Err(ChannelNotFound)` when the response carries no result payload.
    async fn lookup_channel(&self, lookup: &ChannelLookup<'_>) -> Result<ChannelItem, PlatformError>;

    /// One page of an uploads collection; `None` asks for the first page.
    async fn playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemsPage, PlatformError>;

    /// Snippet and statistics for at most [`MAX_PAGE_SIZE`] videos.
    async fn lookup_videos(&self, video_ids: &[String]) -> Result<VideoListResponse, PlatformError>;
}

// ── YouTube Data API v3 ──────────────────────────────────────────────────────

pub struct YoutubeClient {
    client: HttpClient,
    base_url: String,
    api_key: SecretString,
}

impl YoutubeClient {
    pub fn new(config: &ApiConfig, api_key: SecretString) -> Result<Self, PlatformError> {
        let settings = ClientSettings {
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay_ms: config.retry_base_delay_ms,
            },
        };
        Ok(Self {
            client: HttpClient::new(&settings)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// `{base}/{resource}?{params}&key=…`
    fn endpoint(&self, resource: &str, params: &[(&str, &str)]) -> Result<Url, PlatformError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, resource))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", self.api_key.expose_secret());
        Ok(url)
    }
}

#[async_trait]
impl VideoPlatform for YoutubeClient {
    async fn lookup_channel(&self, lookup: &ChannelLookup<'_>) -> Result<ChannelItem, PlatformError> {
        let (field, value) = match lookup {
            ChannelLookup::Id(id) => ("id", *id),
            ChannelLookup::Username(name) => ("forUsername", *name),
        };
        let url = self.endpoint(
            "channels",
            &[("part", "snippet,contentDetails,statistics"), (field, value)],
        )?;

        let resp: ChannelListResponse = self.client.get_json(&url).await?;
        resp.items
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| PlatformError::ChannelNotFound(value.to_string()))
    }

    async fn playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemsPage, PlatformError> {
        let max_results = MAX_PAGE_SIZE.to_string();
        let mut params = vec![
            ("part", "contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let url = self.endpoint("playlistItems", &params)?;
        self.client.get_json(&url).await
    }

    async fn lookup_videos(&self, video_ids: &[String]) -> Result<VideoListResponse, PlatformError> {
        let ids = video_ids.join(",");
        let url = self.endpoint("videos", &[("part", "snippet,statistics"), ("id", ids.as_str())])?;
        self.client.get_json(&url).await
    }
}

// ── Channel resolver ──────────────────────────────────────────────────────────

/// Resolve a configured identifier into a `Channel`.
///
/// An unknown channel is not fatal: the sentinel (`"ERROR"`, 0 subscribers,
/// no uploads) is returned so the sync records an empty fetch for it.
pub async fn resolve_channel(
    platform: &dyn VideoPlatform,
    identifier: &str,
) -> Result<Channel, PlatformError> {
    let lookup = ChannelLookup::for_identifier(identifier);
    match platform.lookup_channel(&lookup).await {
        Ok(item) => {
            debug!("{}: canonical id {}", identifier, item.id);
            let channel = clean_channel(identifier, item);
            info!(
                "{}: \"{}\" ({} subscribers)",
                identifier, channel.name, channel.subscriber_count
            );
            Ok(channel)
        }
        Err(PlatformError::ChannelNotFound(_)) => {
            warn!("{}: channel not found, recording sentinel", identifier);
            Ok(Channel::sentinel(identifier))
        }
        Err(e) => Err(e),
    }
}
