//! Axum-based HTTP server layer.
//!
//! Thin shell around the engine: route matching, parameter parsing,
//! outcome-to-response mapping, CORS, and request tracing. All tile
//! semantics live in [`crate::fill`].

mod handlers;
mod routes;

pub use handlers::{
    health_handler, parse_tile_path, tile_handler, AppState, ErrorResponse, HealthResponse,
};
pub use routes::{create_router, RouterConfig};
