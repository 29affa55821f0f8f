//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /health                               - Health check
//! /{*path}                              - Tile requests, any prefix
//!                                         ending in /tile/{l}/{r}/{c}
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pyrafill::server::{create_router, RouterConfig};
//!
//! let engine = GapFillEngine::new(engine_config, fetcher)?;
//! let router = create_router(engine, RouterConfig::default());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::fetch::RemoteFetcher;
use crate::fill::GapFillEngine;

use super::handlers::{health_handler, tile_handler, AppState};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds for served tiles
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
        }
    }
}

impl RouterConfig {
    /// Set specific allowed CORS origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Build the application router around a gap-fill engine.
pub fn create_router<F: RemoteFetcher + 'static>(
    engine: GapFillEngine<F>,
    config: RouterConfig,
) -> Router {
    let state = AppState::new(engine, config.cache_max_age);

    let cors = match &config.cors_origins {
        None => CorsLayer::new()
            .allow_methods([Method::GET])
            .allow_headers([CONTENT_TYPE])
            .allow_origin(Any),
        Some(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_methods([Method::GET])
                .allow_headers([CONTENT_TYPE])
                .allow_origin(parsed)
        }
    };

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/{*path}", get(tile_handler::<F>))
        .with_state(state)
        .layer(cors);

    if config.enable_tracing {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_config_builders() {
        let config = RouterConfig::default()
            .with_cors_origins(vec!["https://viewer.example".to_string()])
            .with_cache_max_age(60)
            .with_tracing(false);
        assert_eq!(config.cache_max_age, 60);
        assert!(!config.enable_tracing);
        assert_eq!(config.cors_origins.as_ref().map(Vec::len), Some(1));
    }
}
