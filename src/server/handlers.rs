//! HTTP request handlers for the tile API.
//!
//! # Endpoints
//!
//! - `GET /{prefix}/tile/{level}/{row}/{col}` - Serve a (possibly filled) tile
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::FillError;
use crate::fetch::RemoteFetcher;
use crate::fill::{FillOutcome, FillRequest, GapFillEngine};
use crate::raster::TileAddress;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state, passed to handlers via Axum's State extractor.
pub struct AppState<F: RemoteFetcher> {
    /// The gap-fill engine resolving tile requests
    pub engine: Arc<GapFillEngine<F>>,

    /// Cache-Control max-age for served tiles, in seconds
    pub cache_max_age: u32,
}

impl<F: RemoteFetcher> AppState<F> {
    pub fn new(engine: GapFillEngine<F>, cache_max_age: u32) -> Self {
        Self {
            engine: Arc::new(engine),
            cache_max_age,
        }
    }
}

impl<F: RemoteFetcher> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g. "not_found", "invalid_tile")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert FillError to an HTTP response.
///
/// 4xx outcomes are logged at debug/warn, 5xx at error, mirroring their
/// severity for an operator.
impl IntoResponse for FillError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            FillError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "invalid_tile",
                format!("Invalid tile request: {detail}"),
            ),
            FillError::Misconfiguration(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "misconfiguration",
                format!("Server misconfiguration: {detail}"),
            ),
            FillError::Upstream { .. } => {
                (StatusCode::BAD_GATEWAY, "upstream_error", self.to_string())
            }
            FillError::NotFound => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Tile not found".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Tile not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let body = ErrorResponse::with_status(error_type, message, status);
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Path parsing
// =============================================================================

/// Parse tile coordinates out of a routing path.
///
/// Accepts any prefix followed by `/tile/{level}/{row}/{col}`, with an
/// optional extension on the last component. Coordinates parse as signed
/// integers: a negative level is a meaningful request (below the pyramid),
/// negative grid coordinates are not.
pub fn parse_tile_path(path: &str) -> Option<(i64, i64, i64)> {
    let pos = path.find("/tile/")?;
    let mut parts = path[pos + "/tile/".len()..].split('/');
    let level = parts.next()?.parse().ok()?;
    let row = parts.next()?.parse().ok()?;
    let col_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let col = col_part.split('.').next()?.parse().ok()?;
    Some((level, row, col))
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests.
///
/// # Endpoint
///
/// `GET /{prefix}/tile/{level}/{row}/{col}`
///
/// # Response
///
/// - `200 OK`: tile bytes, `ETag` when an identity is known, and an
///   `X-Tile-Filled` header telling whether the tile was synthesized
/// - `302 Found`: an unresolved upstream redirect, passed to the caller
/// - `304 Not Modified`: the caller's `If-None-Match` identity matched
/// - `400 Bad Request`: malformed path or address out of range
/// - `404 Not Found`: exhausted ascension over corrupt/undecodable data
/// - `502 Bad Gateway`: upstream fetch failure
pub async fn tile_handler<F: RemoteFetcher>(
    State(state): State<AppState<F>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path().to_string();
    let Some((level, row, col)) = parse_tile_path(&path) else {
        let body = ErrorResponse::with_status(
            "invalid_tile",
            format!("Malformed tile path: {path}"),
            StatusCode::BAD_REQUEST,
        );
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    if row < 0 || col < 0 || level > u32::MAX as i64 {
        return FillError::BadRequest(format!("tile {level}/{row}/{col}")).into_response();
    }

    // A level below the pyramid is already exhausted: the missing tile
    // stands in, a terminal success.
    if level < 0 {
        return outcome_response(state.engine.missing_tile(), &state);
    }

    let tile = TileAddress::new(level as u32, row as u32, col as u32);
    let mut request = FillRequest::new(tile, path);
    if let Some(query) = uri.query() {
        request = request.with_query(query);
    }
    if let Some(tag) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    {
        request = request.with_if_none_match(tag);
    }

    match state.engine.resolve(&request).await {
        Ok(outcome) => outcome_response(outcome, &state),
        Err(e) => e.into_response(),
    }
}

/// Render an engine outcome as an HTTP response.
fn outcome_response<F: RemoteFetcher>(outcome: FillOutcome, state: &AppState<F>) -> Response {
    let built = match outcome {
        FillOutcome::Served {
            bytes,
            identity,
            filled,
        } => {
            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(
                    header::CONTENT_TYPE,
                    state.engine.config().format.content_type(),
                )
                .header(
                    header::CACHE_CONTROL,
                    format!("public, max-age={}", state.cache_max_age),
                )
                .header("X-Tile-Filled", filled.to_string());
            if let Some(identity) = identity {
                builder = builder.header(header::ETAG, identity.as_str());
            }
            builder.body(axum::body::Body::from(bytes))
        }
        FillOutcome::NotModified { identity } => Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::ETAG, identity.as_str())
            .body(axum::body::Body::empty()),
        FillOutcome::Redirect { location } => Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, location)
            .body(axum::body::Body::empty()),
    };

    match built {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "cannot build tile response");
            FillError::Misconfiguration("unrepresentable response header".to_string())
                .into_response()
        }
    }
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tile_path() {
        assert_eq!(parse_tile_path("/maps/tile/5/10/10"), Some((5, 10, 10)));
        assert_eq!(parse_tile_path("/tile/0/0/0"), Some((0, 0, 0)));
        assert_eq!(
            parse_tile_path("/deep/prefix/tile/3/1/2.jpg"),
            Some((3, 1, 2))
        );
    }

    #[test]
    fn test_parse_tile_path_negative_coordinates() {
        assert_eq!(parse_tile_path("/maps/tile/-1/0/0"), Some((-1, 0, 0)));
        assert_eq!(parse_tile_path("/maps/tile/2/-3/4"), Some((2, -3, 4)));
    }

    #[test]
    fn test_parse_tile_path_rejects_malformed() {
        assert_eq!(parse_tile_path("/maps/5/10/10"), None);
        assert_eq!(parse_tile_path("/maps/tile/5/10"), None);
        assert_eq!(parse_tile_path("/maps/tile/5/10/10/extra"), None);
        assert_eq!(parse_tile_path("/maps/tile/a/b/c"), None);
        assert_eq!(parse_tile_path("/maps/tile///"), None);
    }

    #[test]
    fn test_error_response_serialization() {
        let body = ErrorResponse::with_status("not_found", "Tile not found", StatusCode::NOT_FOUND);
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("not_found"));
        assert!(json.contains("404"));
    }

    #[test]
    fn test_fill_error_status_codes() {
        let response = FillError::BadRequest("tile 9/0/0".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = FillError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = FillError::Upstream {
            status: Some(503),
            message: "origin unavailable".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = FillError::Misconfiguration("bad prefix".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_health_response_serialization() {
        let body = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
    }
}
