//! Raster pyramid model.
//!
//! A raster is a multi-resolution pyramid of fixed-size tiles. This module
//! holds the two value types everything else is built on:
//!
//! - [`RasterGeometry`]: the shape of a pyramid (tile pixel dimensions,
//!   per-level grid extents, sample datatype, and the sentinel
//!   "missing tile" representation). Built once from declarative input,
//!   immutable and shared read-only across requests.
//! - [`TileAddress`]: a (level, row, column) triple with the ascension
//!   transform to its parent and the quadrant predicate used during
//!   oversampling.

mod address;
mod geometry;

pub use address::{Quadrant, TileAddress};
pub use geometry::{LevelGrid, MissingTile, PixelDatatype, RasterGeometry, TileShape};
