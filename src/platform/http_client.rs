use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{debug, warn};
use url::Url;

/// Errors raised while talking to a remote HTTP endpoint.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Network-level failure (DNS, connect, TLS, timeout)
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        body: String,
    },

    /// Body could not be decoded into the expected payload
    #[error("Malformed payload: {0}")]
    Decode(String),

    #[error("Invalid URL {0}")]
    Url(#[from] url::ParseError),

    /// The channel lookup returned no result payload
    #[error("Channel {0} not found")]
    ChannelNotFound(String),
}

impl PlatformError {
    /// Transport failures and 5xx answers are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformError::Transport(_) => true,
            PlatformError::HttpStatus { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

/// How often a failed request is repeated.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    #[cfg(test)]
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        base_delay_ms: 0,
    };

    /// Delays `base, 2·base, 4·base, …` for `max_retries` repetitions.
    fn delays(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor(self.base_delay_ms / 2)
            .take(self.max_retries as usize)
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// Thin wrapper around `reqwest::Client` with status mapping and retries.
pub struct HttpClient {
    inner: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, PlatformError> {
        let inner = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(settings.timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            inner,
            retry: settings.retry,
        })
    }

    /// GET a URL and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, PlatformError> {
        let text = self.get_text(url).await?;
        serde_json::from_str(&text).map_err(|e| PlatformError::Decode(e.to_string()))
    }

    /// GET a URL as text, retrying according to the configured policy.
    pub async fn get_text(&self, url: &Url) -> Result<String, PlatformError> {
        let mut attempt = 0u32;
        RetryIf::start(
            self.retry.delays(),
            || {
                attempt += 1;
                self.get_once(url, attempt)
            },
            |e: &PlatformError| {
                let retry = e.is_retryable();
                if retry && self.retry.max_retries > 0 {
                    warn!("{}; retrying", e);
                }
                retry
            },
        )
        .await
    }

    async fn get_once(&self, url: &Url, attempt: u32) -> Result<String, PlatformError> {
        debug!("GET {} (attempt {})", redact(url), attempt);

        let resp = self.inner.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::HttpStatus {
                status,
                url: redact(url),
                body: truncate(&body, 200),
            });
        }

        Ok(resp.text().await?)
    }
}

/// Render a URL for logs without its API key.
pub fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "key" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    if pairs.is_empty() {
        return shown.to_string();
    }
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(retry: RetryPolicy) -> HttpClient {
        HttpClient::new(&ClientSettings {
            user_agent: "test".into(),
            timeout: Duration::from_secs(5),
            retry,
        })
        .unwrap()
    }

    #[test]
    fn redact_hides_key() {
        let url = Url::parse("https://example.com/v?id=abc&key=secret").unwrap();
        let shown = redact(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("id=abc"));
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy { max_retries: 3, base_delay_ms: 1000 };
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000)
            ]
        );
        assert_eq!(RetryPolicy::NONE.delays().count(), 0);
    }

    #[tokio::test]
    async fn server_error_is_not_retried_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/x", server.uri())).unwrap();
        let err = client(RetryPolicy::NONE).get_text(&url).await.unwrap_err();
        match err {
            PlatformError::HttpStatus { status, .. } => assert_eq!(status.as_u16(), 503),
            e => panic!("Expected HttpStatus(503), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn server_error_retried_when_enabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/x", server.uri())).unwrap();
        let body: serde_json::Value = client(RetryPolicy { max_retries: 3, base_delay_ms: 2 })
            .get_json(&url)
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn client_error_never_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quotaExceeded"))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/x", server.uri())).unwrap();
        let err = client(RetryPolicy { max_retries: 3, base_delay_ms: 2 })
            .get_text(&url)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("quotaExceeded"));
    }

    #[tokio::test]
    async fn malformed_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/x", server.uri())).unwrap();
        let err = client(RetryPolicy::NONE)
            .get_json::<serde_json::Value>(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Decode(_)));
    }
}
