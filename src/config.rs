//! Configuration management for pyrafill.
//!
//! Command-line arguments via clap, environment variables with the
//! `PYRAFILL_` prefix, and sensible defaults for everything optional.
//! The two raster geometry descriptors are JSON files loaded at startup;
//! see [`crate::raster::RasterGeometry`] for the document shape.
//!
//! # Environment Variables
//!
//! - `PYRAFILL_HOST` - Server bind address (default: 0.0.0.0)
//! - `PYRAFILL_PORT` - Server port (default: 3000)
//! - `PYRAFILL_SOURCE` - Internal path of the tile source (required)
//! - `PYRAFILL_SUFFIX` - Suffix appended to source tile paths
//! - `PYRAFILL_ORIGIN` - Base URL fetches resolve against (required)
//! - `PYRAFILL_INPUT_RASTER` / `PYRAFILL_OUTPUT_RASTER` - Geometry files
//! - `PYRAFILL_BACKFILL` - Skip the direct fetch, always synthesize
//! - `PYRAFILL_NEAREST` - Disable smoothing after magnification
//! - `PYRAFILL_BLUR_STRENGTH` - Smoothing strength 0-10 (default: 5)
//! - `PYRAFILL_QUALITY` - Output quality 0-99 (default: 75)
//! - `PYRAFILL_FORMAT` - Output encoding, jpeg or png (default: jpeg)
//! - `PYRAFILL_CACHE` - Enable the in-memory ancestor cache

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::cache::{CacheHints, DEFAULT_KEY_LEN, DEFAULT_OBJ_SIZE};
use crate::codec::{TileFormat, DEFAULT_QUALITY, MAX_QUALITY};
use crate::error::ConfigError;
use crate::fill::{EngineConfig, DEFAULT_MAX_INPUT_SIZE};
use crate::raster::RasterGeometry;
use crate::resample::{ResampleMode, Resampler, DEFAULT_BLUR_STRENGTH, MAX_BLUR_STRENGTH};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default ancestor-cache expiry in seconds (5 minutes).
pub const DEFAULT_CACHE_EXPIRY_SECS: u64 = 5 * 60;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Output format flag
// =============================================================================

/// Output encoding selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl From<OutputFormat> for TileFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Jpeg => TileFormat::Jpeg,
            OutputFormat::Png => TileFormat::Png,
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// pyrafill - a gap-filling tile server.
///
/// Serves tiles from a multi-resolution pyramid and transparently fills
/// gaps: a tile absent at its native resolution is reconstructed by
/// oversampling the relevant quadrant of a lower-resolution ancestor.
#[derive(Parser, Debug, Clone)]
#[command(name = "pyrafill")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PYRAFILL_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PYRAFILL_PORT")]
    pub port: u16,

    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// Internal path of the tile source; `/tile/<level>/<row>/<col>` is
    /// appended for each fetch.
    #[arg(long, env = "PYRAFILL_SOURCE")]
    pub source: String,

    /// Optional suffix appended to constructed source paths (e.g. ".jpg").
    #[arg(long, env = "PYRAFILL_SUFFIX")]
    pub suffix: Option<String>,

    /// Base URL that internal fetch paths resolve against
    /// (e.g. http://127.0.0.1:8080).
    #[arg(long, env = "PYRAFILL_ORIGIN")]
    pub origin: String,

    /// Path to the input raster geometry descriptor (JSON).
    #[arg(long, env = "PYRAFILL_INPUT_RASTER")]
    pub input_raster: String,

    /// Path to the output raster geometry descriptor (JSON).
    #[arg(long, env = "PYRAFILL_OUTPUT_RASTER")]
    pub output_raster: String,

    // =========================================================================
    // Fill Configuration
    // =========================================================================
    /// Assume the origin never has the requested tile and ascend
    /// immediately. Useful when this service sits behind the service being
    /// filled in.
    #[arg(long, default_value_t = false, env = "PYRAFILL_BACKFILL")]
    pub backfill: bool,

    /// Serve pure nearest-neighbor magnification without smoothing.
    #[arg(long, default_value_t = false, env = "PYRAFILL_NEAREST")]
    pub nearest: bool,

    /// Smoothing strength after magnification (0-10).
    #[arg(long, default_value_t = DEFAULT_BLUR_STRENGTH, env = "PYRAFILL_BLUR_STRENGTH")]
    pub blur_strength: u8,

    /// Output quality (0-99). Only affects JPEG output.
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "PYRAFILL_QUALITY")]
    pub quality: u8,

    /// Output encoding for filled tiles.
    #[arg(long, value_enum, default_value_t = OutputFormat::Jpeg, env = "PYRAFILL_FORMAT")]
    pub format: OutputFormat,

    /// Ceiling in bytes for encoded tiles fetched from upstream.
    #[arg(long, default_value_t = DEFAULT_MAX_INPUT_SIZE, env = "PYRAFILL_MAX_INPUT_SIZE")]
    pub max_input_size: usize,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Enable the ancestor tile cache.
    #[arg(long, default_value_t = false, env = "PYRAFILL_CACHE")]
    pub cache: bool,

    /// Cache backend provider. "memory" is the only built-in backend;
    /// anything else fails configuration.
    #[arg(long, default_value = "memory", env = "PYRAFILL_CACHE_PROVIDER")]
    pub cache_provider: String,

    /// Average cache key length hint.
    #[arg(long, default_value_t = DEFAULT_KEY_LEN, env = "PYRAFILL_CACHE_KEY_LEN")]
    pub cache_key_len: usize,

    /// Average cached object size hint in bytes.
    #[arg(long, default_value_t = DEFAULT_OBJ_SIZE, env = "PYRAFILL_CACHE_OBJ_SIZE")]
    pub cache_obj_size: usize,

    /// Ancestor cache expiry in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_EXPIRY_SECS, env = "PYRAFILL_CACHE_EXPIRY")]
    pub cache_expiry: u64,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "PYRAFILL_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated). Unset allows any origin.
    #[arg(long, env = "PYRAFILL_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the scalar settings.
    ///
    /// Geometry files are checked separately by
    /// [`engine_config`](Config::engine_config); everything caught here or
    /// there is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blur_strength > MAX_BLUR_STRENGTH {
            return Err(ConfigError::InvalidBlurStrength(self.blur_strength));
        }
        if self.quality > MAX_QUALITY {
            return Err(ConfigError::InvalidQuality(self.quality));
        }
        if !self.source.starts_with('/') {
            return Err(ConfigError::InvalidRouting(format!(
                "source path {:?} must be an absolute internal path",
                self.source
            )));
        }
        if url::Url::parse(&self.origin).is_err() {
            return Err(ConfigError::InvalidRouting(format!(
                "origin {:?} is not a valid URL",
                self.origin
            )));
        }
        if self.cache && self.cache_provider != "memory" {
            return Err(ConfigError::UnknownCacheProvider(
                self.cache_provider.clone(),
            ));
        }
        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load both geometry descriptors and assemble the engine
    /// configuration. Does not validate it; the engine constructor does.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let input = load_geometry(&self.input_raster)?;
        let output = load_geometry(&self.output_raster)?;
        let mode = if self.nearest {
            ResampleMode::Nearest
        } else {
            ResampleMode::Blurred
        };
        Ok(EngineConfig {
            source: self.source.clone(),
            suffix: self.suffix.clone(),
            backfill: self.backfill,
            input,
            output,
            resampler: Resampler::new(mode, self.blur_strength)?,
            format: self.format.into(),
            quality: self.quality,
            max_input_size: self.max_input_size,
        })
    }

    /// Sizing and expiry hints for the ancestor cache.
    pub fn cache_hints(&self) -> CacheHints {
        CacheHints {
            avg_key_len: self.cache_key_len,
            avg_obj_size: self.cache_obj_size,
            expiry: Duration::from_secs(self.cache_expiry),
        }
        .clamped()
    }
}

/// Read and parse one raster geometry descriptor.
fn load_geometry(path: &str) -> Result<RasterGeometry, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::GeometryIo {
        path: path.to_string(),
        source,
    })?;
    RasterGeometry::from_json(&text).map_err(|source| ConfigError::GeometryParse {
        path: path.to_string(),
        source,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            source: "/maps/base".to_string(),
            suffix: None,
            origin: "http://127.0.0.1:9000".to_string(),
            input_raster: "input.json".to_string(),
            output_raster: "output.json".to_string(),
            backfill: false,
            nearest: false,
            blur_strength: DEFAULT_BLUR_STRENGTH,
            quality: DEFAULT_QUALITY,
            format: OutputFormat::Jpeg,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            cache: false,
            cache_provider: "memory".to_string(),
            cache_key_len: DEFAULT_KEY_LEN,
            cache_obj_size: DEFAULT_OBJ_SIZE,
            cache_expiry: DEFAULT_CACHE_EXPIRY_SECS,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            cors_origins: None,
            verbose: false,
            no_tracing: false,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_blur_strength() {
        let mut config = test_config();
        config.blur_strength = 11;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBlurStrength(11))
        ));
    }

    #[test]
    fn test_invalid_quality() {
        let mut config = test_config();
        config.quality = 100;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidQuality(100))
        ));
    }

    #[test]
    fn test_relative_source_rejected() {
        let mut config = test_config();
        config.source = "maps/base".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRouting(_))
        ));
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let mut config = test_config();
        config.origin = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRouting(_))
        ));
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(test_config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_unknown_cache_provider_rejected() {
        let mut config = test_config();
        config.cache = true;
        config.cache_provider = "shmcb:/run/tiles".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownCacheProvider(_))
        ));

        // Provider string is ignored while the cache is disabled.
        let mut config = test_config();
        config.cache_provider = "shmcb:/run/tiles".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_hints_clamped() {
        let mut config = test_config();
        config.cache_expiry = 3600;
        let hints = config.cache_hints();
        assert_eq!(hints.expiry, Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_missing_geometry_file() {
        let config = test_config();
        assert!(matches!(
            config.engine_config(),
            Err(ConfigError::GeometryIo { .. })
        ));
    }
}
