//! Quadrant oversampling and smoothing.
//!
//! The resampler reconstructs a higher-resolution tile from one quadrant of
//! its parent: the selected quarter of the source page is magnified 2x in
//! each axis (nearest neighbor), then optionally smoothed with a separable
//! 3-tap low-pass filter. Output pages always have the same pixel
//! dimensions as their source.
//!
//! All arithmetic is integer arithmetic. The blur accumulates in `i64` and
//! narrows back with truncating division so output is bit-for-bit
//! reproducible across runs and platforms.

use crate::error::ConfigError;
use crate::raster::{Quadrant, TileShape};

/// Highest accepted blur strength.
pub const MAX_BLUR_STRENGTH: u8 = 10;

/// Default blur strength.
pub const DEFAULT_BLUR_STRENGTH: u8 = 5;

// =============================================================================
// PixelPage
// =============================================================================

/// A decoded tile page: row-major interleaved 8-bit samples.
///
/// Indexing goes through [`sample`](PixelPage::sample) /
/// [`set_sample`](PixelPage::set_sample), which bounds-check in debug
/// builds; no raw offsets leak to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelPage {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl PixelPage {
    /// A zero-filled page with the given tile shape.
    pub fn new(shape: TileShape) -> Self {
        Self {
            width: shape.width as usize,
            height: shape.height as usize,
            channels: shape.channels as usize,
            data: vec![0; shape.samples()],
        }
    }

    /// Wrap an existing interleaved sample buffer. Returns `None` when the
    /// buffer length does not match the shape.
    pub fn from_raw(shape: TileShape, data: Vec<u8>) -> Option<Self> {
        if data.len() != shape.samples() {
            return None;
        }
        Some(Self {
            width: shape.width as usize,
            height: shape.height as usize,
            channels: shape.channels as usize,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples per row.
    pub fn row_stride(&self) -> usize {
        self.width * self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    fn index(&self, x: usize, y: usize, c: usize) -> usize {
        debug_assert!(x < self.width && y < self.height && c < self.channels);
        y * self.row_stride() + x * self.channels + c
    }

    /// One sample at pixel (x, y), channel c.
    #[inline]
    pub fn sample(&self, x: usize, y: usize, c: usize) -> u8 {
        self.data[self.index(x, y, c)]
    }

    #[inline]
    pub fn set_sample(&mut self, x: usize, y: usize, c: usize, value: u8) {
        let i = self.index(x, y, c);
        self.data[i] = value;
    }
}

// =============================================================================
// Resampler
// =============================================================================

/// Oversampling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleMode {
    /// Pure nearest-neighbor magnification
    Nearest,

    /// Nearest-neighbor magnification followed by the separable blur pass
    Blurred,
}

/// Pure-function pixel transform from an ancestor page to a filled page.
///
/// Stateless and deterministic: identical input and quadrant always produce
/// identical output.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    mode: ResampleMode,
    strength: u8,
}

impl Resampler {
    /// Build a resampler, validating the blur strength range at
    /// configuration time.
    pub fn new(mode: ResampleMode, strength: u8) -> Result<Self, ConfigError> {
        if strength > MAX_BLUR_STRENGTH {
            return Err(ConfigError::InvalidBlurStrength(strength));
        }
        Ok(Self { mode, strength })
    }

    pub fn mode(&self) -> ResampleMode {
        self.mode
    }

    /// Magnify one quadrant of `src` to a full page, smoothing afterwards
    /// when the mode asks for it.
    pub fn oversample(&self, src: &PixelPage, quadrant: Quadrant) -> PixelPage {
        let mut dst = oversample_nearest(src, quadrant);
        if self.mode == ResampleMode::Blurred {
            blur_page(&mut dst, self.strength);
        }
        dst
    }
}

/// Magnify one quadrant of the source page by 2x in each axis.
///
/// Destination pixel (x, y) reads source pixel (x/2 + right offset,
/// y/2 + bottom offset), duplicating each source pixel into a 2x2 block.
/// Channel values are copied verbatim.
pub fn oversample_nearest(src: &PixelPage, quadrant: Quadrant) -> PixelPage {
    let mut dst = PixelPage {
        width: src.width,
        height: src.height,
        channels: src.channels,
        data: vec![0; src.data.len()],
    };
    let x_off = if quadrant.right { src.width / 2 } else { 0 };
    let y_off = if quadrant.bottom { src.height / 2 } else { 0 };
    for y in 0..dst.height {
        for x in 0..dst.width {
            for c in 0..dst.channels {
                let v = src.sample(x / 2 + x_off, y / 2 + y_off, c);
                dst.set_sample(x, y, c, v);
            }
        }
    }
    dst
}

/// Separable smoothing: every row, then every column, per channel.
///
/// The row pass fully completes (including the copy-back) before the column
/// pass starts; the column pass reads row-smoothed values.
fn blur_page(page: &mut PixelPage, strength: u8) {
    let width = page.width;
    let height = page.height;
    let mut line = Vec::with_capacity(width.max(height));
    let mut acc = Vec::with_capacity(width.max(height));

    for c in 0..page.channels {
        for y in 0..height {
            line.clear();
            for x in 0..width {
                line.push(page.sample(x, y, c));
            }
            blur_line(&mut line, &mut acc, strength);
            for x in 0..width {
                page.set_sample(x, y, c, line[x]);
            }
        }
    }

    for c in 0..page.channels {
        for x in 0..width {
            line.clear();
            for y in 0..height {
                line.push(page.sample(x, y, c));
            }
            blur_line(&mut line, &mut acc, strength);
            for y in 0..height {
                page.set_sample(x, y, c, line[y]);
            }
        }
    }
}

/// 3-tap low-pass over one line of samples.
///
/// Boundary samples are copied through unchanged. Interior samples become
/// `(v[i]*weight + v[i-1] + v[i+1]) / (weight + 2)` with `weight = 10 -
/// strength`, accumulated in i64 and narrowed with truncating division.
fn blur_line(line: &mut Vec<u8>, acc: &mut Vec<u8>, strength: u8) {
    if line.len() < 3 {
        return;
    }
    acc.clear();
    let weight = i64::from(MAX_BLUR_STRENGTH - strength);
    acc.push(line[0]);
    for i in 1..line.len() - 1 {
        let v = i64::from(line[i]) * weight + i64::from(line[i - 1]) + i64::from(line[i + 1]);
        acc.push((v / (weight + 2)) as u8);
    }
    acc.push(line[line.len() - 1]);
    line.clear();
    line.extend_from_slice(acc);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const Q_TL: Quadrant = Quadrant {
        right: false,
        bottom: false,
    };
    const Q_BR: Quadrant = Quadrant {
        right: true,
        bottom: true,
    };

    fn shape(width: u32, height: u32, channels: u8) -> TileShape {
        TileShape {
            width,
            height,
            channels,
        }
    }

    /// 4x4 single-channel page with sample value 16*y + x.
    fn gradient_page() -> PixelPage {
        let data: Vec<u8> = (0..4)
            .flat_map(|y| (0..4).map(move |x| (16 * y + x) as u8))
            .collect();
        PixelPage::from_raw(shape(4, 4, 1), data).unwrap()
    }

    #[test]
    fn test_from_raw_length_check() {
        assert!(PixelPage::from_raw(shape(4, 4, 1), vec![0; 16]).is_some());
        assert!(PixelPage::from_raw(shape(4, 4, 1), vec![0; 15]).is_none());
        assert!(PixelPage::from_raw(shape(4, 4, 3), vec![0; 16]).is_none());
    }

    #[test]
    fn test_nearest_top_left_quadrant() {
        let src = gradient_page();
        let dst = oversample_nearest(&src, Q_TL);
        // Each source pixel of the top-left 2x2 quarter becomes a 2x2 block.
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(dst.sample(x, y, 0), src.sample(x / 2, y / 2, 0));
            }
        }
        // Spot checks
        assert_eq!(dst.sample(0, 0, 0), 0);
        assert_eq!(dst.sample(1, 1, 0), 0);
        assert_eq!(dst.sample(2, 0, 0), 1);
        assert_eq!(dst.sample(0, 2, 0), 16);
        assert_eq!(dst.sample(3, 3, 0), 17);
    }

    #[test]
    fn test_nearest_bottom_right_quadrant() {
        let src = gradient_page();
        let dst = oversample_nearest(&src, Q_BR);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(dst.sample(x, y, 0), src.sample(x / 2 + 2, y / 2 + 2, 0));
            }
        }
        assert_eq!(dst.sample(0, 0, 0), 16 * 2 + 2);
        assert_eq!(dst.sample(3, 3, 0), 16 * 3 + 3);
    }

    #[test]
    fn test_nearest_output_dimensions_match_source() {
        let src = PixelPage::new(shape(8, 6, 3));
        let dst = oversample_nearest(&src, Q_TL);
        assert_eq!(dst.width(), 8);
        assert_eq!(dst.height(), 6);
        assert_eq!(dst.channels(), 3);
    }

    #[test]
    fn test_nearest_channels_copied_independently() {
        let mut src = PixelPage::new(shape(4, 4, 3));
        src.set_sample(0, 0, 0, 10);
        src.set_sample(0, 0, 1, 20);
        src.set_sample(0, 0, 2, 30);
        let dst = oversample_nearest(&src, Q_TL);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(dst.sample(x, y, 0), 10);
            assert_eq!(dst.sample(x, y, 1), 20);
            assert_eq!(dst.sample(x, y, 2), 30);
        }
    }

    #[test]
    fn test_oversample_deterministic() {
        let src = gradient_page();
        let resampler = Resampler::new(ResampleMode::Blurred, 7).unwrap();
        let a = resampler.oversample(&src, Q_BR);
        let b = resampler.oversample(&src, Q_BR);
        assert_eq!(a, b);
    }

    #[test]
    fn test_blur_constant_page_is_identity() {
        // weight*v + v + v over (weight + 2) is exactly v, at any strength
        for strength in 0..=MAX_BLUR_STRENGTH {
            let src = PixelPage::from_raw(shape(4, 4, 1), vec![137; 16]).unwrap();
            let resampler = Resampler::new(ResampleMode::Blurred, strength).unwrap();
            let dst = resampler.oversample(&src, Q_TL);
            assert!(dst.data().iter().all(|&v| v == 137), "strength {strength}");
        }
    }

    #[test]
    fn test_blur_leaves_boundary_samples_unchanged() {
        let src = gradient_page();
        let nearest = oversample_nearest(&src, Q_TL);
        let blurred = Resampler::new(ResampleMode::Blurred, 10)
            .unwrap()
            .oversample(&src, Q_TL);
        // Corners survive both passes untouched.
        for (x, y) in [(0, 0), (3, 0), (0, 3), (3, 3)] {
            assert_eq!(blurred.sample(x, y, 0), nearest.sample(x, y, 0));
        }
    }

    #[test]
    fn test_blur_strength_zero_heavy_identity_weighting() {
        // weight = 10: each pass moves an interior sample by at most a
        // couple of counts of truncation on this gradient
        let src = gradient_page();
        let nearest = oversample_nearest(&src, Q_TL);
        let blurred = Resampler::new(ResampleMode::Blurred, 0)
            .unwrap()
            .oversample(&src, Q_TL);
        for y in 0..4 {
            for x in 0..4 {
                let n = i64::from(nearest.sample(x, y, 0));
                let b = i64::from(blurred.sample(x, y, 0));
                assert!((n - b).abs() <= 4, "({x},{y}): nearest {n} blurred {b}");
            }
        }
        // Corners survive both passes untouched at any strength.
        assert_eq!(blurred.sample(0, 0, 0), nearest.sample(0, 0, 0));
        assert_eq!(blurred.sample(3, 3, 0), nearest.sample(3, 3, 0));
    }

    #[test]
    fn test_blur_line_truncating_division() {
        // strength 10 -> weight 0: out[i] = (v[i-1] + v[i+1]) / 2, truncated
        let mut line = vec![0u8, 5, 10];
        let mut acc = Vec::new();
        blur_line(&mut line, &mut acc, 10);
        assert_eq!(line, vec![0, 5, 10]);

        let mut line = vec![1u8, 0, 2];
        blur_line(&mut line, &mut acc, 10);
        // (1 + 2) / 2 truncates to 1
        assert_eq!(line, vec![1, 1, 2]);
    }

    #[test]
    fn test_blur_row_pass_feeds_column_pass() {
        // A page varying in both axes: the column pass must see
        // row-smoothed values, so full-strength blur of a single hot pixel
        // spreads along rows first, then down columns.
        let mut src = PixelPage::new(shape(4, 4, 1));
        src.set_sample(1, 1, 0, 200);
        let dst = Resampler::new(ResampleMode::Blurred, 10)
            .unwrap()
            .oversample(&src, Q_TL);
        // The hot source pixel covers dst (2..4, 2..4) before smoothing.
        // After both passes some energy lands outside that block.
        assert!(dst.sample(1, 2, 0) > 0);
    }

    #[test]
    fn test_invalid_strength_rejected() {
        assert!(Resampler::new(ResampleMode::Blurred, 11).is_err());
        assert!(Resampler::new(ResampleMode::Blurred, 10).is_ok());
        assert!(Resampler::new(ResampleMode::Nearest, 0).is_ok());
    }

    #[test]
    fn test_nearest_mode_skips_blur() {
        let src = gradient_page();
        let resampler = Resampler::new(ResampleMode::Nearest, 5).unwrap();
        assert_eq!(
            resampler.oversample(&src, Q_TL),
            oversample_nearest(&src, Q_TL)
        );
    }
}
