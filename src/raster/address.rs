//! Tile addressing and level ascension.

/// Which quarter of a parent tile a child tile's footprint occupies.
///
/// The parent covers four children; `right`/`bottom` select the half of the
/// parent page along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quadrant {
    pub right: bool,
    pub bottom: bool,
}

/// Identifies one tile of a raster by pyramid level and grid position.
///
/// Level 0 is the coarsest level. Addresses are plain values; validity
/// against a concrete raster is checked by
/// [`RasterGeometry::contains`](super::RasterGeometry::contains).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileAddress {
    pub level: u32,
    pub row: u32,
    pub col: u32,
}

impl TileAddress {
    pub fn new(level: u32, row: u32, col: u32) -> Self {
        Self { level, row, col }
    }

    /// The lower-resolution tile covering this one, or `None` at the top
    /// of the pyramid.
    ///
    /// Ascension halves the grid coordinates: the parent sits at
    /// `(level - 1, row / 2, col / 2)`.
    pub fn parent(&self) -> Option<TileAddress> {
        if self.level == 0 {
            return None;
        }
        Some(TileAddress {
            level: self.level - 1,
            row: self.row / 2,
            col: self.col / 2,
        })
    }

    /// Which quadrant of `parent` this tile occupies.
    ///
    /// Exact integer arithmetic: the child sits in the right half when its
    /// column is not the doubled parent column, and in the bottom half when
    /// its row is not the doubled parent row.
    pub fn quadrant_within(&self, parent: &TileAddress) -> Quadrant {
        Quadrant {
            right: self.col != parent.col * 2,
            bottom: self.row != parent.row * 2,
        }
    }
}

impl std::fmt::Display for TileAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.row, self.col)
    }
}
