//! Tile payload codec.
//!
//! Thin adapter over the `image` crate: decode an encoded tile payload into
//! a [`PixelPage`] sized to one raster page, and encode a page back at a
//! configured quality. The format of an incoming payload is determined by
//! its leading byte signature; unsupported signatures are a decode error.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader};

use crate::error::CodecError;
use crate::raster::RasterGeometry;
use crate::resample::PixelPage;

/// Default output quality.
pub const DEFAULT_QUALITY: u8 = 75;

/// Highest accepted output quality.
pub const MAX_QUALITY: u8 = 99;

/// Smallest payload that could possibly be a valid encoded image.
///
/// Anything shorter is treated as corrupt upstream data, not decoded.
pub const MIN_ENCODED_SIZE: usize = 4;

// =============================================================================
// Format
// =============================================================================

/// Encoded tile formats the codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Jpeg,
    Png,
}

impl TileFormat {
    /// Sniff the format from a payload's leading signature.
    pub fn detect(bytes: &[u8]) -> Result<TileFormat, CodecError> {
        if bytes.len() < MIN_ENCODED_SIZE {
            return Err(CodecError::Undersized { len: bytes.len() });
        }
        if bytes[..3] == [0xFF, 0xD8, 0xFF] {
            return Ok(TileFormat::Jpeg);
        }
        if bytes[..4] == [0x89, b'P', b'N', b'G'] {
            return Ok(TileFormat::Png);
        }
        Err(CodecError::UnknownSignature)
    }

    /// MIME type for responses in this format.
    pub const fn content_type(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "image/jpeg",
            TileFormat::Png => "image/png",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "jpeg",
            TileFormat::Png => "png",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            TileFormat::Jpeg => ImageFormat::Jpeg,
            TileFormat::Png => ImageFormat::Png,
        }
    }
}

// =============================================================================
// Decode
// =============================================================================

/// Decode an encoded tile into a page sized to the raster's tile shape.
///
/// The payload's format is sniffed from its signature. The decoded image is
/// converted to the raster's channel count and its dimensions are checked
/// against the tile shape.
pub fn decode(bytes: &[u8], geometry: &RasterGeometry) -> Result<PixelPage, CodecError> {
    let format = TileFormat::detect(bytes)?;

    let reader = ImageReader::with_format(Cursor::new(bytes), format.image_format());
    let img = reader
        .decode()
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    let (width, height) = (img.width(), img.height());
    if width != geometry.tile.width || height != geometry.tile.height {
        return Err(CodecError::ShapeMismatch {
            got_width: width,
            got_height: height,
            want_width: geometry.tile.width,
            want_height: geometry.tile.height,
        });
    }

    let data = match geometry.tile.channels {
        1 => img.into_luma8().into_raw(),
        2 => img.into_luma_alpha8().into_raw(),
        3 => img.into_rgb8().into_raw(),
        4 => img.into_rgba8().into_raw(),
        c => {
            return Err(CodecError::Decode(format!(
                "cannot produce {c}-channel pages"
            )))
        }
    };

    PixelPage::from_raw(geometry.tile, data)
        .ok_or_else(|| CodecError::Decode("decoded buffer size mismatch".to_string()))
}

// =============================================================================
// Encode
// =============================================================================

/// Encode a page with the output raster's parameters.
///
/// `quality` follows the 0-99 configuration range; it only affects JPEG
/// output.
pub fn encode(page: &PixelPage, format: TileFormat, quality: u8) -> Result<Bytes, CodecError> {
    let width = page.width() as u32;
    let height = page.height() as u32;
    let color = match page.channels() {
        1 => ExtendedColorType::L8,
        2 => ExtendedColorType::La8,
        3 => ExtendedColorType::Rgb8,
        4 => ExtendedColorType::Rgba8,
        c => {
            return Err(CodecError::Encode(format!(
                "cannot encode {c}-channel pages"
            )))
        }
    };

    let mut out = Vec::new();
    match format {
        TileFormat::Jpeg => {
            // The image crate's JPEG quality floor is 1.
            let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
            encoder
                .write_image(page.data(), width, height, color)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
        }
        TileFormat::Png => {
            let encoder = PngEncoder::new(&mut out);
            encoder
                .write_image(page.data(), width, height, color)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
        }
    }
    Ok(Bytes::from(out))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{LevelGrid, MissingTile, PixelDatatype, TileShape};

    fn geometry(width: u32, height: u32, channels: u8) -> RasterGeometry {
        RasterGeometry {
            tile: TileShape {
                width,
                height,
                channels,
            },
            datatype: PixelDatatype::Byte,
            levels: vec![LevelGrid {
                tiles_wide: 1,
                tiles_high: 1,
            }],
            missing: MissingTile::default(),
        }
    }

    fn gradient_page(width: u32, height: u32, channels: u8) -> PixelPage {
        let shape = TileShape {
            width,
            height,
            channels,
        };
        let mut page = PixelPage::new(shape);
        for y in 0..height as usize {
            for x in 0..width as usize {
                for c in 0..channels as usize {
                    page.set_sample(x, y, c, ((x + y + c * 5) % 256) as u8);
                }
            }
        }
        page
    }

    #[test]
    fn test_detect_jpeg() {
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x00];
        assert_eq!(TileFormat::detect(&bytes).unwrap(), TileFormat::Jpeg);
    }

    #[test]
    fn test_detect_png() {
        let bytes = [0x89, b'P', b'N', b'G', 0x0D, 0x0A];
        assert_eq!(TileFormat::detect(&bytes).unwrap(), TileFormat::Png);
    }

    #[test]
    fn test_detect_unknown_signature() {
        let bytes = [0x00, 0x01, 0x02, 0x03];
        assert!(matches!(
            TileFormat::detect(&bytes),
            Err(CodecError::UnknownSignature)
        ));
    }

    #[test]
    fn test_detect_undersized() {
        assert!(matches!(
            TileFormat::detect(&[0xFF, 0xD8]),
            Err(CodecError::Undersized { len: 2 })
        ));
        assert!(matches!(
            TileFormat::detect(&[]),
            Err(CodecError::Undersized { len: 0 })
        ));
    }

    #[test]
    fn test_png_round_trip_exact() {
        // PNG is lossless: decode(encode(page)) must reproduce the page.
        let geometry = geometry(16, 16, 3);
        let page = gradient_page(16, 16, 3);
        let encoded = encode(&page, TileFormat::Png, 0).unwrap();
        let decoded = decode(&encoded, &geometry).unwrap();
        assert_eq!(decoded, page);
    }

    #[test]
    fn test_jpeg_round_trip_stable() {
        // Lossy, but re-encoding an already-encoded page at the same
        // quality must stay within codec tolerance.
        let geometry = geometry(16, 16, 1);
        let page = gradient_page(16, 16, 1);
        let first = encode(&page, TileFormat::Jpeg, 90).unwrap();
        let decoded = decode(&first, &geometry).unwrap();
        let second = encode(&decoded, TileFormat::Jpeg, 90).unwrap();
        let redecoded = decode(&second, &geometry).unwrap();
        for (a, b) in decoded.data().iter().zip(redecoded.data()) {
            assert!((i16::from(*a) - i16::from(*b)).abs() <= 16);
        }
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let page = gradient_page(16, 16, 3);
        let encoded = encode(&page, TileFormat::Png, 0).unwrap();
        let wrong = geometry(32, 32, 3);
        assert!(matches!(
            decode(&encoded, &wrong),
            Err(CodecError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_converts_channels() {
        // RGB payload served into a grayscale raster collapses to one channel.
        let page = gradient_page(8, 8, 3);
        let encoded = encode(&page, TileFormat::Png, 0).unwrap();
        let gray = geometry(8, 8, 1);
        let decoded = decode(&encoded, &gray).unwrap();
        assert_eq!(decoded.channels(), 1);
        assert_eq!(decoded.data().len(), 64);
    }

    #[test]
    fn test_decode_garbage_with_valid_signature() {
        let mut bytes = vec![0xFF, 0xD8, 0xFF];
        bytes.extend_from_slice(&[0x00; 32]);
        let geometry = geometry(8, 8, 1);
        assert!(matches!(
            decode(&bytes, &geometry),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn test_jpeg_quality_zero_is_encodable() {
        // Configuration allows quality 0; the encoder floors it internally.
        let page = gradient_page(8, 8, 1);
        let encoded = encode(&page, TileFormat::Jpeg, 0).unwrap();
        assert_eq!(&encoded[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_content_types() {
        assert_eq!(TileFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(TileFormat::Png.content_type(), "image/png");
    }
}
