//! Remote tile fetching.
//!
//! The engine consumes tile payloads through the [`RemoteFetcher`] trait;
//! the production implementation is [`HttpFetcher`], a thin `reqwest`
//! client with automatic redirects disabled so the engine owns the
//! single-follow redirect policy.

mod http;

pub use http::HttpFetcher;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

/// Outcome class of one fetch attempt.
///
/// `Error` covers everything that is neither data nor a clean absence:
/// transport failures, 5xx responses, oversized bodies. The engine never
/// falls back on an `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// Payload retrieved
    Success,

    /// Origin reports the tile does not exist
    NotFound,

    /// Origin answered with a redirect; see [`FetchResult::redirect`]
    Redirect,

    /// Transport or server failure
    Error {
        status: Option<u16>,
        message: String,
    },
}

/// Result of one fetch attempt.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: FetchStatus,

    /// Payload bytes; empty unless `status` is `Success`
    pub bytes: Bytes,

    /// Origin identity tag (ETag), when the origin provided one
    pub identity: Option<String>,

    /// Redirect target, when `status` is `Redirect`
    pub redirect: Option<String>,
}

impl FetchResult {
    pub fn success(bytes: Bytes, identity: Option<String>) -> Self {
        Self {
            status: FetchStatus::Success,
            bytes,
            identity,
            redirect: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: FetchStatus::NotFound,
            bytes: Bytes::new(),
            identity: None,
            redirect: None,
        }
    }

    pub fn redirect(target: impl Into<String>) -> Self {
        Self {
            status: FetchStatus::Redirect,
            bytes: Bytes::new(),
            identity: None,
            redirect: Some(target.into()),
        }
    }

    pub fn error(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status: FetchStatus::Error {
                status,
                message: message.into(),
            },
            bytes: Bytes::new(),
            identity: None,
            redirect: None,
        }
    }
}

/// Opaque transport for tile payloads.
///
/// Targets are internal paths (optionally with query arguments); how they
/// resolve to an actual host is the implementation's business. Failures are
/// reported in-band through [`FetchStatus`], so the engine sees one uniform
/// result shape.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, target: &str) -> FetchResult;
}

#[async_trait]
impl<T: RemoteFetcher + ?Sized> RemoteFetcher for std::sync::Arc<T> {
    async fn fetch(&self, target: &str) -> FetchResult {
        (**self).fetch(target).await
    }
}

/// Extract an internal path (plus query) from a redirect target.
///
/// Absolute `scheme://host/path` targets are reduced to their path; targets
/// already starting with `/` pass through. Anything else (protocol-relative
/// garbage, opaque URLs, relative paths) does not resolve to an internal
/// path and returns `None`.
pub fn internal_redirect_path(target: &str) -> Option<String> {
    match Url::parse(target) {
        Ok(url) => {
            if url.cannot_be_a_base() {
                return None;
            }
            let mut path = url.path().to_string();
            if let Some(query) = url.query() {
                path.push('?');
                path.push_str(query);
            }
            Some(path)
        }
        Err(url::ParseError::RelativeUrlWithoutBase) if target.starts_with('/') => {
            Some(target.to_string())
        }
        Err(_) => None,
    }
}
