//! HTTP fetcher backed by `reqwest`.

use bytes::Bytes;
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use tracing::{trace, warn};
use url::Url;

use crate::error::ConfigError;

use super::{FetchResult, RemoteFetcher};

/// Default per-request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fetches tiles from an HTTP origin.
///
/// Internal-path targets are resolved against a configured base URL.
/// Redirects are *not* followed by the client; they are reported to the
/// engine, which implements the single-follow policy itself.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base: Url,
}

impl HttpFetcher {
    /// Build a fetcher resolving targets against `origin`
    /// (e.g. `http://127.0.0.1:8080`).
    pub fn new(origin: &str) -> Result<Self, ConfigError> {
        Self::with_timeout(origin, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(origin: &str, timeout_secs: u64) -> Result<Self, ConfigError> {
        let base = Url::parse(origin)
            .map_err(|e| ConfigError::InvalidRouting(format!("origin {origin}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .redirect(Policy::none())
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ConfigError::InvalidRouting(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, base })
    }

    fn resolve(&self, target: &str) -> Result<Url, url::ParseError> {
        self.base.join(target)
    }
}

#[async_trait::async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, target: &str) -> FetchResult {
        let url = match self.resolve(target) {
            Ok(url) => url,
            Err(e) => {
                return FetchResult::error(None, format!("unresolvable target {target}: {e}"))
            }
        };
        trace!(%url, "fetching tile");

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, "tile fetch failed");
                return FetchResult::error(None, format!("request failed: {e}"));
            }
        };

        let status = response.status();
        match status {
            StatusCode::OK => {
                let identity = response
                    .headers()
                    .get(reqwest::header::ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                match response.bytes().await {
                    Ok(bytes) => FetchResult::success(Bytes::from(bytes), identity),
                    Err(e) => FetchResult::error(None, format!("cannot read body: {e}")),
                }
            }
            StatusCode::NOT_FOUND => FetchResult::not_found(),
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => {
                match response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                {
                    Some(location) => FetchResult::redirect(location),
                    None => FetchResult::error(
                        Some(status.as_u16()),
                        "redirect without a Location header",
                    ),
                }
            }
            other => {
                warn!(%url, status = other.as_u16(), "unexpected origin status");
                FetchResult::error(Some(other.as_u16()), format!("origin returned {other}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_against_base() {
        let fetcher = HttpFetcher::new("http://origin.local:8080").unwrap();
        let url = fetcher.resolve("/maps/tile/3/1/2").unwrap();
        assert_eq!(url.as_str(), "http://origin.local:8080/maps/tile/3/1/2");
    }

    #[test]
    fn test_invalid_origin_rejected() {
        assert!(HttpFetcher::new("not a url").is_err());
    }
}
