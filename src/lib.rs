//! # pyrafill
//!
//! A gap-filling tile server for multi-resolution rasters.
//!
//! pyrafill serves tiles from an image pyramid and transparently fills
//! gaps: when a requested tile is absent at its native resolution, the
//! engine walks up the pyramid until real data is found, magnifies the
//! relevant quadrant of the ancestor back to the target resolution
//! (optionally smoothing it), re-encodes the result, and serves it with a
//! content-derived identity tag. Only some pyramid levels need to exist in
//! storage for the full pyramid to be servable.
//!
//! ## Features
//!
//! - **Level ascension**: recursive walk to the nearest ancestor with real
//!   data, bounded by the pyramid height
//! - **Quadrant oversampling**: exact integer 2x magnification with an
//!   optional separable smoothing pass
//! - **Ancestor caching**: fetched ancestors are memoized under a TTL;
//!   cache trouble degrades to a miss, never to an error
//! - **Conditional responses**: 13-character base-32 identity tokens with
//!   `If-None-Match` support
//! - **Pass-through and backfill modes**: fill gaps in a fronted service's
//!   pyramid, or synthesize everything straight from a configured source
//!
//! ## Architecture
//!
//! - [`raster`] - Pyramid geometry and tile addressing
//! - [`resample`] - Page view and the oversample/blur transform
//! - [`cache`] - Ancestor tile cache interface and in-memory backend
//! - [`codec`] - Encoded payload sniffing, decode and encode
//! - [`fetch`] - Remote fetch interface and the HTTP implementation
//! - [`fill`] - The gap-fill engine and identity tokens
//! - [`server`] - Axum routes and handlers
//! - [`config`] - CLI and configuration types

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod fetch;
pub mod fill;
pub mod raster;
pub mod resample;
pub mod server;

// Re-export commonly used types
pub use cache::{ancestor_key, AncestorCache, CacheHints, MemoryAncestorCache};
pub use codec::{TileFormat, DEFAULT_QUALITY, MAX_QUALITY, MIN_ENCODED_SIZE};
pub use config::{Config, OutputFormat};
pub use error::{CacheError, CodecError, ConfigError, FillError};
pub use fetch::{
    internal_redirect_path, FetchResult, FetchStatus, HttpFetcher, RemoteFetcher,
};
pub use fill::{
    EngineConfig, FillOutcome, FillRequest, GapFillEngine, IdentityTag, DEFAULT_MAX_INPUT_SIZE,
    IDENTITY_LEN,
};
pub use raster::{
    LevelGrid, MissingTile, PixelDatatype, Quadrant, RasterGeometry, TileAddress, TileShape,
};
pub use resample::{
    oversample_nearest, PixelPage, ResampleMode, Resampler, DEFAULT_BLUR_STRENGTH,
    MAX_BLUR_STRENGTH,
};
pub use server::{create_router, AppState, RouterConfig};
