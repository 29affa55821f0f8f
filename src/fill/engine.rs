//! Gap-fill resolution engine.
//!
//! The engine is the orchestrator behind every tile request:
//!
//! 1. Validate the address against the output raster.
//! 2. Try the direct fetch (skipped in backfill mode). A real payload is
//!    passed through untouched; a not-found or the missing-tile sentinel
//!    starts the ascent.
//! 3. Resolve the parent tile: ancestor cache first, then a remote fetch
//!    with a single-follow redirect policy. An ancestor that is itself
//!    absent is synthesized from *its* parent by the same procedure,
//!    bounded by the pyramid height.
//! 4. Decode the ancestor, oversample the quadrant the requested tile
//!    occupies, re-encode with the output raster's parameters.
//! 5. Tag the result with a content identity and honor conditional
//!    requests.
//!
//! Fetched ancestors are cached; the originally requested tile and
//! synthesized tiles never are. Upstream transport failures surface
//! immediately; the fallback machinery compensates for missing data, not
//! for broken fetches.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::{ancestor_key, AncestorCache};
use crate::codec::{self, TileFormat, MAX_QUALITY, MIN_ENCODED_SIZE};
use crate::error::{ConfigError, FillError};
use crate::fetch::{internal_redirect_path, FetchStatus, RemoteFetcher};
use crate::raster::{RasterGeometry, TileAddress};
use crate::resample::Resampler;

use super::identity::IdentityTag;

/// Default ceiling for encoded tile payloads: 1 MiB.
pub const DEFAULT_MAX_INPUT_SIZE: usize = 1024 * 1024;

// =============================================================================
// Engine configuration
// =============================================================================

/// Everything the engine needs to know, validated once at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Internal path of the tile source, e.g. `/maps/base`
    pub source: String,

    /// Optional suffix appended to constructed source paths, e.g. `.jpg`
    pub suffix: Option<String>,

    /// Skip the direct fetch and always synthesize from the source
    pub backfill: bool,

    /// Geometry of the raster tiles are fetched from
    pub input: RasterGeometry,

    /// Geometry of the raster tiles are served as
    pub output: RasterGeometry,

    /// Quadrant oversampling transform
    pub resampler: Resampler,

    /// Output encoding
    pub format: TileFormat,

    /// Output quality, 0-99
    pub quality: u8,

    /// Ceiling for encoded payloads fetched from upstream
    pub max_input_size: usize,
}

impl EngineConfig {
    /// Setup-time validation; any failure here is fatal for the service
    /// and can never occur at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.input.validate()?;
        self.output.validate()?;
        if self.input.tile != self.output.tile {
            return Err(ConfigError::MismatchedTileShape {
                input: self.input.tile.to_string(),
                output: self.output.tile.to_string(),
            });
        }
        if self.quality > MAX_QUALITY {
            return Err(ConfigError::InvalidQuality(self.quality));
        }
        if self.format == TileFormat::Jpeg && !matches!(self.output.tile.channels, 1 | 3) {
            return Err(ConfigError::UnsupportedChannels {
                format: "jpeg",
                channels: self.output.tile.channels,
            });
        }
        if !self.source.starts_with('/') {
            return Err(ConfigError::InvalidRouting(format!(
                "source path {:?} must be an absolute internal path",
                self.source
            )));
        }
        if self.max_input_size < MIN_ENCODED_SIZE {
            return Err(ConfigError::InvalidBufferSize(self.max_input_size));
        }
        Ok(())
    }
}

// =============================================================================
// Request and outcome
// =============================================================================

/// One incoming tile request.
#[derive(Debug, Clone)]
pub struct FillRequest {
    /// Requested tile, already parsed from the routing path
    pub tile: TileAddress,

    /// The inbound routing path, e.g. `/maps/base/tile/5/10/10`. Ancestor
    /// requests in pass-through mode substitute coordinates into this path.
    pub path: String,

    /// Caller's query arguments, preserved on pass-through ascent
    pub query: Option<String>,

    /// Caller's conditional-request identity
    pub if_none_match: Option<String>,
}

impl FillRequest {
    pub fn new(tile: TileAddress, path: impl Into<String>) -> Self {
        Self {
            tile,
            path: path.into(),
            query: None,
            if_none_match: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_if_none_match(mut self, tag: impl Into<String>) -> Self {
        self.if_none_match = Some(tag.into());
        self
    }
}

/// Terminal success states of a tile request.
///
/// Failure states live in [`FillError`].
#[derive(Debug, Clone)]
pub enum FillOutcome {
    /// Tile bytes ready to send
    Served {
        bytes: Bytes,

        /// Identity tag for the `ETag` header; absent only when the origin
        /// passed a tile through without one
        identity: Option<IdentityTag>,

        /// Whether the tile was synthesized from an ancestor
        filled: bool,
    },

    /// The caller's conditional identity matched; no bytes to send
    NotModified { identity: IdentityTag },

    /// An unresolved redirect surfaced to the caller
    Redirect { location: String },
}

/// Classified result of one (redirect-following) fetch.
enum Fetched {
    Data {
        bytes: Bytes,
        identity: Option<IdentityTag>,
    },
    Absent,
    Redirect {
        location: String,
    },
}

// =============================================================================
// Engine
// =============================================================================

/// The gap-fill resolution engine. Shared read-only across requests.
pub struct GapFillEngine<F: RemoteFetcher> {
    config: EngineConfig,
    fetcher: F,
    cache: Option<Arc<dyn AncestorCache>>,

    /// Normalized sentinel identity of the input raster, used to recognize
    /// "no data" responses from the origin
    missing_input_identity: IdentityTag,

    /// Normalized sentinel identity of the output raster, attached to the
    /// missing tile served on exhaustion
    missing_output_identity: IdentityTag,
}

impl<F: RemoteFetcher> GapFillEngine<F> {
    /// Build an engine, failing on any configuration error.
    pub fn new(config: EngineConfig, fetcher: F) -> Result<Self, ConfigError> {
        config.validate()?;
        let missing_input_identity = IdentityTag::normalize(&config.input.missing.identity);
        let missing_output_identity = IdentityTag::normalize(&config.output.missing.identity);
        Ok(Self {
            config,
            fetcher,
            cache: None,
            missing_input_identity,
            missing_output_identity,
        })
    }

    /// Attach an ancestor cache backend.
    pub fn with_cache(mut self, cache: Arc<dyn AncestorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The sentinel missing-tile response: terminal success, not an error.
    pub fn missing_tile(&self) -> FillOutcome {
        FillOutcome::Served {
            bytes: Bytes::from(self.config.output.missing.data.clone()),
            identity: Some(self.missing_output_identity.clone()),
            filled: false,
        }
    }

    /// Resolve one tile request to a terminal state.
    pub async fn resolve(&self, req: &FillRequest) -> Result<FillOutcome, FillError> {
        let tile = req.tile;
        if !self.config.output.contains(&tile) {
            return Err(FillError::BadRequest(format!(
                "tile {tile} outside the output raster"
            )));
        }

        // Direct fetch, unless backfill mode assumes the origin never has
        // the requested tile, or the input raster simply has no such level.
        if !self.config.backfill && (tile.level as usize) < self.config.input.level_count() {
            let target = self.source_target(&tile);
            match self.fetch_with_redirect(&target).await? {
                Fetched::Data { bytes, identity } => {
                    if identity.as_ref() != Some(&self.missing_input_identity) {
                        debug!(%tile, "direct fetch hit, passing tile through");
                        return Ok(FillOutcome::Served {
                            bytes,
                            identity,
                            filled: false,
                        });
                    }
                    debug!(%tile, "origin served the missing-tile sentinel");
                }
                Fetched::Absent => {
                    debug!(%tile, "tile absent at native level");
                }
                Fetched::Redirect { location } => {
                    return Ok(FillOutcome::Redirect { location });
                }
            }
        }

        self.fill(req, tile, 0).await
    }

    /// Synthesize `tile` from its parent. Recursion steps one level up per
    /// call; `depth` is capped by the pyramid height to survive a corrupt
    /// configuration.
    fn fill<'a>(
        &'a self,
        req: &'a FillRequest,
        tile: TileAddress,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Result<FillOutcome, FillError>> + Send + 'a>> {
        Box::pin(async move {
            if depth >= self.config.output.level_count() {
                return Err(FillError::Misconfiguration(format!(
                    "ascension depth {depth} exceeds the pyramid height"
                )));
            }

            let Some(parent) = tile.parent() else {
                debug!(%tile, "pyramid exhausted, serving the missing tile");
                return Ok(self.missing_tile());
            };

            let scope = self.source_scope(req)?;
            let key = ancestor_key(scope.trim_start_matches('/'), &parent);

            let bytes = match self.cache_lookup(&key).await {
                Some(bytes) => bytes,
                None => {
                    let target = self.ancestor_target(req, &parent)?;
                    match self.fetch_with_redirect(&target).await? {
                        Fetched::Data { bytes, identity }
                            if identity.as_ref() != Some(&self.missing_input_identity) =>
                        {
                            if bytes.len() >= MIN_ENCODED_SIZE {
                                self.cache_store(&key, &bytes).await;
                            }
                            bytes
                        }
                        // Data absent at this level too (not-found or the
                        // sentinel): synthesize the ancestor from its own
                        // parent. Synthesized tiles are never cached.
                        Fetched::Data { .. } | Fetched::Absent => {
                            match self.fill(req, parent, depth + 1).await? {
                                FillOutcome::Served {
                                    bytes,
                                    identity,
                                    filled,
                                } => {
                                    let is_sentinel = !filled
                                        && identity.as_ref()
                                            == Some(&self.missing_output_identity);
                                    if is_sentinel {
                                        // Exhausted further up: the missing
                                        // tile stands in for every level below.
                                        return Ok(FillOutcome::Served {
                                            bytes,
                                            identity,
                                            filled,
                                        });
                                    }
                                    bytes
                                }
                                other => return Ok(other),
                            }
                        }
                        Fetched::Redirect { location } => {
                            return Ok(FillOutcome::Redirect { location });
                        }
                    }
                }
            };

            if bytes.len() < MIN_ENCODED_SIZE {
                warn!(%parent, len = bytes.len(), "ancestor payload under the minimum image size");
                return Err(FillError::NotFound);
            }

            // Decode failure means unusable upstream data, not a system
            // fault; ascending past a corrupt tile risks serving
            // wrong-quadrant data, so the request ends here.
            let page = match codec::decode(&bytes, &self.config.input) {
                Ok(page) => page,
                Err(e) => {
                    warn!(%parent, error = %e, "ancestor decode failed");
                    return Err(FillError::NotFound);
                }
            };

            let quadrant = tile.quadrant_within(&parent);
            let filled = self.config.resampler.oversample(&page, quadrant);

            let encoded = match codec::encode(&filled, self.config.format, self.config.quality) {
                Ok(encoded) => encoded,
                Err(e) => {
                    warn!(%tile, error = %e, "filled tile encode failed");
                    return Err(FillError::NotFound);
                }
            };

            let identity = IdentityTag::from_content(&encoded);
            if depth == 0 {
                if let Some(inm) = &req.if_none_match {
                    if IdentityTag::normalize(inm) == identity {
                        return Ok(FillOutcome::NotModified { identity });
                    }
                }
            }

            debug!(%tile, %parent, right = quadrant.right, bottom = quadrant.bottom,
                "filled tile from ancestor");
            Ok(FillOutcome::Served {
                bytes: encoded,
                identity: Some(identity),
                filled: true,
            })
        })
    }

    /// Fetch a target, following at most one redirect when its target
    /// resolves to an internal path. A second redirect, or an external
    /// target, is handed back unresolved.
    async fn fetch_with_redirect(&self, target: &str) -> Result<Fetched, FillError> {
        let first = self.fetcher.fetch(target).await;
        let result = if matches!(first.status, FetchStatus::Redirect) {
            let location = first.redirect.unwrap_or_default();
            match internal_redirect_path(&location) {
                Some(path) => {
                    let second = self.fetcher.fetch(&path).await;
                    if matches!(second.status, FetchStatus::Redirect) {
                        let location = second.redirect.unwrap_or(path);
                        return Ok(Fetched::Redirect { location });
                    }
                    second
                }
                None => return Ok(Fetched::Redirect { location }),
            }
        } else {
            first
        };

        match result.status {
            FetchStatus::Success => {
                if result.bytes.len() > self.config.max_input_size {
                    return Err(FillError::Upstream {
                        status: None,
                        message: format!(
                            "payload of {} bytes exceeds the {} byte input ceiling",
                            result.bytes.len(),
                            self.config.max_input_size
                        ),
                    });
                }
                Ok(Fetched::Data {
                    bytes: result.bytes,
                    identity: result.identity.map(|raw| IdentityTag::normalize(&raw)),
                })
            }
            FetchStatus::NotFound => Ok(Fetched::Absent),
            FetchStatus::Redirect => Ok(Fetched::Redirect {
                location: result.redirect.unwrap_or_default(),
            }),
            FetchStatus::Error { status, message } => Err(FillError::Upstream { status, message }),
        }
    }

    // =========================================================================
    // Target and key construction
    // =========================================================================

    fn tile_path(prefix: &str, tile: &TileAddress) -> String {
        format!(
            "{}/tile/{}/{}/{}",
            prefix.trim_end_matches('/'),
            tile.level,
            tile.row,
            tile.col
        )
    }

    /// Path of a tile at the configured source.
    fn source_target(&self, tile: &TileAddress) -> String {
        let mut target = Self::tile_path(&self.config.source, tile);
        if let Some(suffix) = &self.config.suffix {
            target.push_str(suffix);
        }
        target
    }

    /// Path an ancestor is fetched from: the caller's own routing path with
    /// substituted coordinates (pass-through), or the source (backfill).
    fn ancestor_target(&self, req: &FillRequest, parent: &TileAddress) -> Result<String, FillError> {
        if self.config.backfill {
            return Ok(self.source_target(parent));
        }
        let prefix = self.routing_prefix(&req.path)?;
        let mut target = Self::tile_path(prefix, parent);
        if let Some(query) = &req.query {
            if !query.is_empty() {
                target.push('?');
                target.push_str(query);
            }
        }
        Ok(target)
    }

    /// Logical source identifier scoping cache keys: the routing prefix of
    /// the inbound path, or the source path in backfill mode. Stable
    /// regardless of the inbound URL shape.
    fn source_scope<'a>(&'a self, req: &'a FillRequest) -> Result<&'a str, FillError> {
        if self.config.backfill {
            Ok(&self.config.source)
        } else {
            self.routing_prefix(&req.path)
        }
    }

    fn routing_prefix<'a>(&self, path: &'a str) -> Result<&'a str, FillError> {
        match path.find("/tile/") {
            Some(pos) => Ok(&path[..pos]),
            None => Err(FillError::Misconfiguration(
                "tile request path is missing the /tile/ segment".to_string(),
            )),
        }
    }

    // =========================================================================
    // Cache access (failures downgrade to a miss)
    // =========================================================================

    async fn cache_lookup(&self, key: &str) -> Option<Bytes> {
        let cache = self.cache.as_deref()?;
        match cache.lookup(key).await {
            Ok(Some(bytes)) => {
                debug!(key, "ancestor cache hit");
                Some(bytes)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn cache_store(&self, key: &str, bytes: &Bytes) {
        if let Some(cache) = self.cache.as_deref() {
            debug!(key, len = bytes.len(), "caching ancestor tile");
            if let Err(e) = cache.store(key, bytes.clone()).await {
                warn!(key, error = %e, "cache store failed");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
