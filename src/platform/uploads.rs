//! Walks an uploads collection page by page.

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use super::http_client::PlatformError;
use super::VideoPlatform;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazy, finite cursor over the pages of one uploads collection.
///
/// Each `next_page` call issues one request and yields that page's video ids
/// until the platform stops handing out continuation tokens.
pub struct UploadPages<'a> {
    platform: &'a dyn VideoPlatform,
    playlist_id: String,
    delay: Duration,
    cursor: Cursor,
    requests: usize,
}

impl<'a> UploadPages<'a> {
    pub fn new(platform: &'a dyn VideoPlatform, playlist_id: &str, delay: Duration) -> Self {
        // A channel that failed to resolve has no uploads collection.
        let cursor = if playlist_id.is_empty() {
            Cursor::Done
        } else {
            Cursor::Start
        };
        Self {
            platform,
            playlist_id: playlist_id.to_string(),
            delay,
            cursor,
            requests: 0,
        }
    }

    /// `Ok(None)` once the last page has been yielded.
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>, PlatformError> {
        let token = match &self.cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token.clone()),
        };

        if token.is_some() && !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let page = self
            .platform
            .playlist_page(&self.playlist_id, token.as_deref())
            .await?;
        self.requests += 1;

        self.cursor = match page.next_page_token {
            Some(next) => Cursor::Next(next),
            None => Cursor::Done,
        };

        let ids: Vec<String> = page
            .items
            .into_iter()
            .map(|item| item.content_details.video_id)
            .collect();
        debug!(
            "{}: page {} with {} videos",
            self.playlist_id,
            self.requests,
            ids.len()
        );
        Ok(Some(ids))
    }

    /// Start over from the first page.
    pub fn restart(&mut self) {
        self.cursor = if self.playlist_id.is_empty() {
            Cursor::Done
        } else {
            Cursor::Start
        };
        self.requests = 0;
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Drain the remaining pages into one ordered id list.
    pub async fn collect_all(&mut self) -> Result<Vec<String>, PlatformError> {
        let mut all = Vec::new();
        while let Some(ids) = self.next_page().await? {
            all.extend(ids);
        }
        Ok(all)
    }
}

/// All video ids of an uploads collection, in collection order.
pub async fn list_upload_ids(
    platform: &dyn VideoPlatform,
    playlist_id: &str,
    delay: Duration,
) -> Result<Vec<String>, PlatformError> {
    let mut pages = UploadPages::new(platform, playlist_id, delay);
    let ids = pages.collect_all().await?;
    debug!("{}: {} ids in {} requests", playlist_id, ids.len(), pages.requests());
    Ok(ids)
}
