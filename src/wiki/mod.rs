//! Looks up channel ids on a fan wiki, one member page at a time.
//!
//! Used to seed the `channels` list: each member page links to the member's
//! channel, and the id is the last path segment of that link.

use crate::config::WikiConfig;
use crate::platform::http_client::{ClientSettings, HttpClient, PlatformError, RetryPolicy};
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

const CHANNEL_LINK_MARKER: &str = "youtube.com/channel/";

#[derive(Debug, Error)]
pub enum WikiError {
    #[error(transparent)]
    Http(#[from] PlatformError),

    #[error("Invalid wiki base URL {0:?}")]
    BaseUrl(String),

    #[error("No channel link on the page of {0}")]
    NoChannelLink(String),

    #[error("Bad selector: {0}")]
    Selector(String),
}

/// A resolved member, printable as a `channels` list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberChannel {
    pub name: String,
    pub channel_id: String,
}

impl MemberChannel {
    pub fn yaml_line(&self) -> String {
        format!("  - {} # {}", self.channel_id, self.name)
    }
}

pub struct WikiScraper {
    client: HttpClient,
    base_url: Url,
    delay: Duration,
}

impl WikiScraper {
    pub fn new(config: &WikiConfig, user_agent: &str) -> Result<Self, WikiError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|_| WikiError::BaseUrl(config.base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(WikiError::BaseUrl(config.base_url.clone()));
        }

        let client = HttpClient::new(&ClientSettings {
            user_agent: user_agent.to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay_ms: config.backoff_base_ms,
            },
        })?;

        Ok(Self {
            client,
            base_url,
            delay: Duration::from_millis(config.delay_ms),
        })
    }

    /// `{base}/{name}` with the name percent-encoded as one path segment.
    pub fn member_url(&self, name: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(name);
        }
        url
    }

    pub async fn channel_of(&self, name: &str) -> Result<MemberChannel, WikiError> {
        let url = self.member_url(name);
        debug!("wiki page for {}: {}", name, url);
        let html = self.client.get_text(&url).await?;
        let channel_id =
            extract_channel_id(&html)?.ok_or_else(|| WikiError::NoChannelLink(name.to_string()))?;

        Ok(MemberChannel {
            name: name.to_string(),
            channel_id,
        })
    }

    /// Resolve members in order, pausing between pages. The first member
    /// without a link stops the run.
    pub async fn channels_of(&self, names: &[String]) -> Result<Vec<MemberChannel>, WikiError> {
        let mut out = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.delay).await;
            }
            let member = self.channel_of(name).await?;
            info!("{} → {}", member.name, member.channel_id);
            out.push(member);
        }
        Ok(out)
    }
}

/// Id from the first `…/youtube.com/channel/{id}` link in the page.
pub fn extract_channel_id(html: &str) -> Result<Option<String>, WikiError> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(&format!("a[href*=\"{}\"]", CHANNEL_LINK_MARKER))
        .map_err(|e| WikiError::Selector(format!("{:?}", e)))?;

    let id = doc
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| {
            let (_, rest) = href.split_once(CHANNEL_LINK_MARKER)?;
            let id = rest
                .split(['/', '?', '#'])
                .next()
                .unwrap_or_default()
                .trim();
            (!id.is_empty()).then(|| id.to_string())
        });
    Ok(id)
}

/// Member names from a newline-separated file body; blank lines are skipped.
pub fn parse_member_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
