use thiserror::Error;

/// Errors raised while building the service configuration.
///
/// All of these are fatal at startup; none of them can occur while a
/// request is being served.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read a raster geometry file
    #[error("cannot read raster geometry {path}: {source}")]
    GeometryIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Raster geometry file did not parse
    #[error("cannot parse raster geometry {path}: {source}")]
    GeometryParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A raster geometry failed its own validation
    #[error("invalid raster geometry: {0}")]
    InvalidGeometry(String),

    /// Input and output rasters must share the same tile pixel shape
    #[error("input and output tile shapes differ: {input} vs {output}")]
    MismatchedTileShape { input: String, output: String },

    /// Blur strength outside the accepted range
    #[error("blur strength {0} out of range (0-10)")]
    InvalidBlurStrength(u8),

    /// Output quality outside the accepted range
    #[error("quality {0} out of range (0-99)")]
    InvalidQuality(u8),

    /// Output format cannot represent the configured channel count
    #[error("{format} output does not support {channels} channel(s)")]
    UnsupportedChannels {
        format: &'static str,
        channels: u8,
    },

    /// Source path or origin URL is unusable
    #[error("invalid routing configuration: {0}")]
    InvalidRouting(String),

    /// Encoded-tile buffer ceiling is too small to hold any tile
    #[error("input buffer ceiling of {0} bytes is too small")]
    InvalidBufferSize(usize),

    /// Requested cache backend does not exist
    #[error("unknown cache provider {0:?} (available: memory)")]
    UnknownCacheProvider(String),
}

/// Errors from the codec layer (decode/encode of tile payloads).
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload is too small to be any encoded image
    #[error("payload of {len} bytes is below the minimum encoded size")]
    Undersized { len: usize },

    /// Leading signature does not match any supported format
    #[error("unrecognized image signature")]
    UnknownSignature,

    /// Bitstream decode failed
    #[error("decode failed: {0}")]
    Decode(String),

    /// Bitstream encode failed
    #[error("encode failed: {0}")]
    Encode(String),

    /// Decoded page does not match the raster's tile shape
    #[error("decoded page is {got_width}x{got_height}, raster expects {want_width}x{want_height}")]
    ShapeMismatch {
        got_width: u32,
        got_height: u32,
        want_width: u32,
        want_height: u32,
    },
}

/// Errors from an ancestor cache backend.
///
/// These are never surfaced to a caller; the engine downgrades them to a
/// cache miss and logs them.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the gap-fill engine.
///
/// Together with the success outcomes (`Served`, `NotModified`, `Redirect`)
/// this is the complete result taxonomy of a tile request.
#[derive(Debug, Error)]
pub enum FillError {
    /// Tile address outside the output raster (client error, no fetch issued)
    #[error("tile address out of range: {0}")]
    BadRequest(String),

    /// A routing or setup assumption was violated at request time
    #[error("server misconfiguration: {0}")]
    Misconfiguration(String),

    /// The origin failed in a way other than "data absent"; surfaced
    /// immediately, never triggers fallback
    #[error("upstream fetch failed: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// Exhausted ascension past a corrupt ancestor, or unusable upstream data
    #[error("tile not found")]
    NotFound,
}
