//! Page fetching with a single bounded retry.
//!
//! [`HttpFetcher`] issues a GET with a browser user agent. A 429, 503, or
//! 504 response is retried exactly once after a fixed backoff; any other
//! non-200 status, a second failure, or a transport error yields `None`.
//! Failures are never surfaced as errors: acquisition treats a missing page
//! as an empty segment.
//!
//! Every attempt is logged with its `url` and `status`.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::config::FetchConfig;

/// Source of page bodies. Implemented by [`HttpFetcher`] and by test doubles.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the body of `url`, or `None` if it could not be retrieved.
    async fn fetch(&self, url: &str) -> Option<String>;
}

/// Statuses worth one more attempt.
pub fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 503 | 504)
}

pub struct HttpFetcher {
    client: reqwest::Client,
    retry_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            retry_backoff: config.retry_backoff(),
        })
    }

    /// One GET. `Err` carries the status of a response that was not a 200.
    async fn attempt(&self, url: &str) -> std::result::Result<String, Option<StatusCode>> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, error = %e, "request failed");
                return Err(None);
            }
        };

        let status = response.status();
        info!(url, status = status.as_u16(), "fetched");
        if status != StatusCode::OK {
            return Err(Some(status));
        }

        response.text().await.map_err(|e| {
            warn!(url, error = %e, "failed to read response body");
            None
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Option<String> {
        match self.attempt(url).await {
            Ok(body) => Some(body),
            Err(Some(status)) if is_retryable(status) => {
                info!(
                    url,
                    status = status.as_u16(),
                    backoff_secs = self.retry_backoff.as_secs_f64(),
                    "retrying after backoff"
                );
                tokio::time::sleep(self.retry_backoff).await;
                self.attempt(url).await.ok()
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::Router;

    /// Serves `statuses[n]` on the n-th request (the last one repeats) and
    /// counts requests.
    async fn serve(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = (Arc::new(statuses), hits.clone());

        async fn handler(
            State((statuses, hits)): State<(Arc<Vec<u16>>, Arc<AtomicUsize>)>,
        ) -> (AxumStatus, &'static str) {
            let n = hits.fetch_add(1, Ordering::SeqCst);
            let code = statuses[n.min(statuses.len() - 1)];
            (
                AxumStatus::from_u16(code).unwrap(),
                "<html><body>page body</body></html>",
            )
        }

        let app = Router::new().route("/page", get(handler)).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/page"), hits)
    }

    fn fetcher() -> HttpFetcher {
        let mut config = FetchConfig::default();
        config.timeout_secs = 5;
        let mut fetcher = HttpFetcher::new(&config).unwrap();
        fetcher.retry_backoff = Duration::from_millis(10);
        fetcher
    }

    #[tokio::test]
    async fn ok_response_returns_body() {
        let (url, hits) = serve(vec![200]).await;
        let body = fetcher().fetch(&url).await;
        assert!(body.unwrap().contains("page body"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_once_on_service_unavailable() {
        let (url, hits) = serve(vec![503, 200]).await;
        let body = fetcher().fetch(&url).await;
        assert!(body.is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_second_failure() {
        let (url, hits) = serve(vec![429, 429, 200]).await;
        assert!(fetcher().fetch(&url).await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_status_is_not_retried() {
        let (url, hits) = serve(vec![404, 200]).await;
        assert!(fetcher().fetch(&url).await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let (url, hits) = serve(vec![500, 200]).await;
        assert!(fetcher().fetch(&url).await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_host_yields_none() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(fetcher().fetch(&format!("http://{addr}/")).await.is_none());
    }

    #[test]
    fn retryable_statuses() {
        for code in [429, 503, 504] {
            assert!(is_retryable(StatusCode::from_u16(code).unwrap()));
        }
        for code in [200, 404, 500, 502] {
            assert!(!is_retryable(StatusCode::from_u16(code).unwrap()));
        }
    }
}
