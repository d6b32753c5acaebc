use crate::models::FetchedVideo;
use tracing::debug;

use super::cleaner::clean_video;
use super::http_client::PlatformError;
use super::{VideoPlatform, MAX_PAGE_SIZE};

/// Fetch snippet + statistics for `video_ids`, 50 ids per request.
///
/// Ids the platform does not return (deleted, private) are dropped. The
/// result is in response order; callers sort by publish time.
pub async fn fetch_videos(
    platform: &dyn VideoPlatform,
    video_ids: &[String],
) -> Result<Vec<FetchedVideo>, PlatformError> {
    let mut videos = Vec::with_capacity(video_ids.len());

    for chunk in video_ids.chunks(MAX_PAGE_SIZE) {
        let resp = platform.lookup_videos(chunk).await?;
        let returned = resp.items.len();
        if returned < chunk.len() {
            debug!("{} of {} videos missing from batch", chunk.len() - returned, chunk.len());
        }
        for item in resp.items {
            videos.push(clean_video(item)?);
        }
    }

    Ok(videos)
}

/// Oldest first.
pub fn sort_by_published(videos: &mut [FetchedVideo]) {
    videos.sort_by(|a, b| a.published_at.cmp(&b.published_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use serde_json::json;
    use std::collections::HashSet;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("v{}", i)).collect()
    }

    fn platform_with(n: usize) -> FakePlatform {
        (0..n).fold(FakePlatform::default(), |p, i| {
            p.with_video(
                &format!("v{}", i),
                "2020-01-01T00:00:00Z",
                json!({"viewCount": i.to_string()}),
            )
        })
    }

    #[tokio::test]
    async fn one_request_per_fifty_ids() {
        for (n, expected) in [(0, 0), (1, 1), (50, 1), (51, 2), (120, 3)] {
            let platform = platform_with(n);
            let videos = fetch_videos(&platform, &ids(n)).await.unwrap();
            assert_eq!(platform.calls("videos"), expected, "n = {}", n);
            assert_eq!(videos.len(), n);
        }
    }

    #[tokio::test]
    async fn missing_videos_are_dropped() {
        // Only every other id exists upstream.
        let platform = (0..60).step_by(2).fold(FakePlatform::default(), |p, i| {
            p.with_video(&format!("v{}", i), "2020-01-01T00:00:00Z", json!({}))
        });
        let requested = ids(60);
        let videos = fetch_videos(&platform, &requested).await.unwrap();

        assert_eq!(videos.len(), 30);
        let requested: HashSet<_> = requested.iter().collect();
        assert!(videos.iter().all(|v| requested.contains(&v.video_id)));
        assert!(videos.iter().all(|v| v.view == 0 && v.comment == 0));
    }

    #[tokio::test]
    async fn failed_batch_aborts() {
        let platform = FakePlatform {
            fail_videos: true,
            ..platform_with(3)
        };
        assert!(fetch_videos(&platform, &ids(3)).await.is_err());
    }

    #[tokio::test]
    async fn sorted_oldest_first() {
        let platform = FakePlatform::default()
            .with_video("late", "2022-05-01T00:00:00Z", json!({}))
            .with_video("early", "2019-05-01T00:00:00Z", json!({}));
        let mut videos = fetch_videos(&platform, &["late".into(), "early".into()])
            .await
            .unwrap();
        sort_by_published(&mut videos);
        let order: Vec<_> = videos.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(order, vec!["early", "late"]);
    }
}
