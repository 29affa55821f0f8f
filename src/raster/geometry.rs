//! Raster geometry descriptors.
//!
//! Geometry is declarative configuration: a JSON document describing the
//! pyramid shape is loaded at startup, validated once, and shared read-only
//! for the life of the service.
//!
//! # Example descriptor
//!
//! ```json
//! {
//!   "tile": { "width": 256, "height": 256, "channels": 3 },
//!   "datatype": "byte",
//!   "levels": [
//!     { "tiles_wide": 1, "tiles_high": 1 },
//!     { "tiles_wide": 2, "tiles_high": 2 },
//!     { "tiles_wide": 4, "tiles_high": 4 }
//!   ],
//!   "missing": { "data": [], "identity": "empty00000000" }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::TileAddress;

// =============================================================================
// Tile shape and datatype
// =============================================================================

/// Pixel dimensions and channel count of every tile in a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileShape {
    /// Tile width in pixels
    pub width: u32,

    /// Tile height in pixels
    pub height: u32,

    /// Samples per pixel (1 = grayscale, 3 = RGB, 4 = RGBA)
    pub channels: u8,
}

impl TileShape {
    /// Total samples in one page (width * height * channels).
    pub fn samples(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

impl std::fmt::Display for TileShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Per-channel sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelDatatype {
    /// 8-bit unsigned samples
    Byte,

    /// 16-bit unsigned samples
    Uint16,
}

impl PixelDatatype {
    /// Width of one sample in bytes.
    pub const fn size_bytes(&self) -> usize {
        match self {
            PixelDatatype::Byte => 1,
            PixelDatatype::Uint16 => 2,
        }
    }
}

// =============================================================================
// Levels and the missing-tile sentinel
// =============================================================================

/// Grid extent of one pyramid level, in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelGrid {
    pub tiles_wide: u32,
    pub tiles_high: u32,
}

/// The designated "no data" tile of a raster.
///
/// Distinct from a transport-level not-found: a missing tile exists in
/// storage (or is synthesized on exhaustion) and carries a fixed identity so
/// callers and the engine can recognize it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingTile {
    /// Encoded payload served when the pyramid is exhausted. May be empty,
    /// or a small valid image (e.g. a transparent PNG).
    #[serde(default)]
    pub data: Vec<u8>,

    /// Raw identity tag marking this tile as "no data". Normalized by the
    /// engine before comparison.
    #[serde(default)]
    pub identity: String,
}

// =============================================================================
// RasterGeometry
// =============================================================================

/// The complete shape of a tile pyramid.
///
/// Level 0 is the coarsest level; the last level is native resolution.
/// Instances are immutable after [`validate`](RasterGeometry::validate)
/// passes at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterGeometry {
    /// Pixel shape shared by every tile of every level
    pub tile: TileShape,

    /// Sample encoding
    #[serde(default = "default_datatype")]
    pub datatype: PixelDatatype,

    /// Grid extents, coarsest first
    pub levels: Vec<LevelGrid>,

    /// Sentinel missing-tile representation
    #[serde(default)]
    pub missing: MissingTile,
}

fn default_datatype() -> PixelDatatype {
    PixelDatatype::Byte
}

impl RasterGeometry {
    /// Parse a geometry descriptor from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Check internal consistency. Called once at configuration time; a
    /// failure here is fatal for the service.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile.width == 0 || self.tile.height == 0 {
            return Err(ConfigError::InvalidGeometry(format!(
                "tile shape {} has a zero dimension",
                self.tile
            )));
        }
        if self.tile.width % 2 != 0 || self.tile.height % 2 != 0 {
            return Err(ConfigError::InvalidGeometry(format!(
                "tile shape {} must have even dimensions for quadrant oversampling",
                self.tile
            )));
        }
        if !matches!(self.tile.channels, 1..=4) {
            return Err(ConfigError::InvalidGeometry(format!(
                "{} channels per pixel is not supported (1-4)",
                self.tile.channels
            )));
        }
        if self.datatype != PixelDatatype::Byte {
            return Err(ConfigError::InvalidGeometry(
                "only 8-bit samples are supported".to_string(),
            ));
        }
        if self.levels.is_empty() {
            return Err(ConfigError::InvalidGeometry(
                "raster has no levels".to_string(),
            ));
        }
        for (i, level) in self.levels.iter().enumerate() {
            if level.tiles_wide == 0 || level.tiles_high == 0 {
                return Err(ConfigError::InvalidGeometry(format!(
                    "level {i} has a zero grid extent"
                )));
            }
        }
        Ok(())
    }

    /// Number of pyramid levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Grid extent of one level, if it exists.
    pub fn grid(&self, level: u32) -> Option<&LevelGrid> {
        self.levels.get(level as usize)
    }

    /// Whether an address falls inside this raster.
    pub fn contains(&self, tile: &TileAddress) -> bool {
        match self.grid(tile.level) {
            Some(grid) => tile.row < grid.tiles_high && tile.col < grid.tiles_wide,
            None => false,
        }
    }

    /// Size in bytes of one decoded page.
    pub fn page_bytes(&self) -> usize {
        self.tile.samples() * self.datatype.size_bytes()
    }
}

// =============================================================================
// Tests
// =============================================================================
