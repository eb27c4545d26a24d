//! Locating and fetching raw caption payloads.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

use crate::captions::ParseError;
use crate::config::HttpConfig;
use crate::ExtractionError;

pub mod tracks;

pub use tracks::{caption_tracks, CaptionTrack, TrackChoice, TrackPreference};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("request timed out after {0}ms")]
    Timeout(u128),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("response body could not be decoded: {0}")]
    Decode(String),
}

impl FetchError {
    /// Errors a second try might not reproduce
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Network(_) => true,
            FetchError::Status(code) => *code == 408 || *code == 429 || *code >= 500,
            FetchError::Decode(_) => false,
        }
    }
}

impl From<FetchError> for ExtractionError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Decode(msg) => ExtractionError::Parse(ParseError::Malformed(msg)),
            e if e.is_transient() => ExtractionError::Transient(e.to_string()),
            e => ExtractionError::PreconditionUnmet(format!("caption endpoint refused: {}", e)),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(0)
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Network fetch capability used by the acquisition layers
#[async_trait]
pub trait CaptionFetcher: Send + Sync {
    /// GET a document as text
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// POST a JSON body and decode the JSON response
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, FetchError>;
}

/// `reqwest`-backed fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_str(&config.accept_language)?,
        );

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

fn check_status(status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::Status(status.as_u16()))
    }
}

#[async_trait]
impl CaptionFetcher for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url, "GET");
        let response = self.client.get(url).send().await?;
        check_status(response.status())?;
        Ok(response.text().await?)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, FetchError> {
        tracing::debug!(url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        check_status(response.status())?;
        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Per-request timeout plus the single in-layer retry for transient failures
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub request_timeout: Duration,
    pub retry_delay: Duration,
}

impl FetchPolicy {
    /// Run `op` under the request timeout, retrying exactly once if the failure is transient
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ExtractionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        match self.once(&mut op).await {
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    request = label,
                    error = %e,
                    "transient fetch failure, retrying once"
                );
                tokio::time::sleep(self.retry_delay).await;
                self.once(&mut op).await.map_err(ExtractionError::from)
            }
            other => other.map_err(ExtractionError::from),
        }
    }

    async fn once<T, F, Fut>(&self, op: &mut F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        match tokio::time::timeout(self.request_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.request_timeout.as_millis())),
        }
    }

    pub async fn get_text(
        &self,
        fetcher: &dyn CaptionFetcher,
        url: &str,
    ) -> Result<String, ExtractionError> {
        self.run("caption document", || fetcher.get_text(url)).await
    }

    pub async fn post_json(
        &self,
        fetcher: &dyn CaptionFetcher,
        url: &str,
        body: &Value,
    ) -> Result<Value, ExtractionError> {
        self.run("player endpoint", || fetcher.post_json(url, body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFetcher, Reply};

    fn policy() -> FetchPolicy {
        FetchPolicy {
            request_timeout: Duration::from_millis(40),
            retry_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(FetchError::Status(503).is_transient());
        assert!(FetchError::Status(429).is_transient());
        assert!(!FetchError::Status(404).is_transient());
        assert!(FetchError::Timeout(10).is_transient());
        assert!(!FetchError::Decode("x".into()).is_transient());
    }

    #[test]
    fn test_conversion_into_extraction_error() {
        assert!(ExtractionError::from(FetchError::Network("reset".into())).is_transient());
        assert!(matches!(
            ExtractionError::from(FetchError::Status(403)),
            ExtractionError::PreconditionUnmet(_)
        ));
        assert!(matches!(
            ExtractionError::from(FetchError::Decode("eof".into())),
            ExtractionError::Parse(_)
        ));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let fetcher = FakeFetcher::new()
            .route_sequence("timedtext", vec![Reply::Status(503), Reply::Body("ok".into())]);

        let body = policy().get_text(&fetcher, "https://x/api/timedtext").await.unwrap();

        assert_eq!(body, "ok");
        assert_eq!(fetcher.calls_matching("timedtext"), 2);
    }

    #[tokio::test]
    async fn test_timeout_twice_gives_up_as_transient() {
        let fetcher = FakeFetcher::new().route("timedtext", Reply::Hang);

        let err = policy().get_text(&fetcher, "https://x/api/timedtext").await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(fetcher.calls_matching("timedtext"), 2);
    }

    #[tokio::test]
    async fn test_refusal_is_not_retried() {
        let fetcher = FakeFetcher::new().route("timedtext", Reply::Status(404));

        let err = policy().get_text(&fetcher, "https://x/api/timedtext").await.unwrap_err();

        assert!(matches!(err, ExtractionError::PreconditionUnmet(_)));
        assert_eq!(fetcher.calls_matching("timedtext"), 1);
    }
}
