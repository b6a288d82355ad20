//! Page fetching with manual redirect handling.
//!
//! Automatic client-side redirects would bypass the safety checker, so the
//! client is built with redirects disabled and each hop is validated before
//! it is followed.

use std::time::Duration;

use reqwest::{redirect, Client, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::safety::{SafetyViolation, UrlSafetyChecker};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECT_HOPS: usize = 3;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsafe URL: {0}")]
    Unsafe(#[from] SafetyViolation),
    #[error("too many redirects ({0} hops followed)")]
    TooManyRedirects(usize),
    #[error("unusable redirect target: {0}")]
    BadLocation(String),
    #[error("HTTP status {0}")]
    Status(StatusCode),
    #[error("transport error: {0}")]
    Transport(String),
}

/// A successfully fetched page body.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL the body was served from, after redirects.
    pub url: Url,
    pub status: u16,
    pub html: String,
    pub hops: usize,
}

/// HTTP client that refuses to touch non-public destinations.
pub struct PageFetcher {
    checker: UrlSafetyChecker,
    client: Client,
}

impl PageFetcher {
    pub fn new(checker: UrlSafetyChecker, user_agent: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(redirect::Policy::none())
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self { checker, client }
    }

    /// Fetch a page, re-validating the target URL on every redirect hop.
    pub async fn fetch(&self, raw_url: &str) -> Result<FetchedPage, FetchError> {
        let mut current = Url::parse(raw_url)
            .map_err(|e| FetchError::Unsafe(SafetyViolation::Invalid(e.to_string())))?;
        let mut hops = 0usize;

        loop {
            self.checker.check_parsed(&current).await?;

            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            let status = response.status();

            if status.is_redirection() {
                if hops >= MAX_REDIRECT_HOPS {
                    return Err(FetchError::TooManyRedirects(hops));
                }
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        FetchError::BadLocation(format!(
                            "{} response from {} without usable Location header",
                            status, current
                        ))
                    })?;
                let next = current
                    .join(location)
                    .map_err(|e| FetchError::BadLocation(format!("{}: {}", location, e)))?;
                debug!("Following redirect {} -> {}", current, next);
                current = next;
                hops += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Status(status));
            }

            let html = response
                .text()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            return Ok(FetchedPage {
                url: current,
                status: status.as_u16(),
                html,
                hops,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::DnsPolicy;

    fn fetcher() -> PageFetcher {
        PageFetcher::new(
            UrlSafetyChecker::new(DnsPolicy::BestEffort),
            "urlharvest-test/0.1",
            5,
        )
    }

    #[tokio::test]
    async fn test_unsafe_url_fails_before_any_connection() {
        let err = fetcher().fetch("http://10.0.0.1/internal").await.unwrap_err();
        assert!(matches!(err, FetchError::Unsafe(_)));

        let err = fetcher().fetch("http://localhost:9999/").await.unwrap_err();
        assert!(matches!(err, FetchError::Unsafe(_)));
    }

    #[tokio::test]
    async fn test_unparseable_url_maps_to_unsafe() {
        let err = fetcher().fetch("not a url").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Unsafe(SafetyViolation::Invalid(_))
        ));
    }

    #[test]
    fn test_error_messages_name_the_problem() {
        let err = FetchError::TooManyRedirects(3);
        assert!(err.to_string().contains("redirects"));
        let err = FetchError::Status(StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("404"));
    }
}
