//! Grid to world coordinate mapping.
//!
//! The server speaks integer grid cells; the scene wants world-space positions.
//! Mirroring is a separate, integer-only step applied before mapping so the far
//! edge of the grid never drifts when the result is later cast to `f32`.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

/// Integer grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// World-space position (y is up, the grid lies on the x/z plane).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPos {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Midpoint between two world positions.
    pub fn midpoint(self, other: WorldPos) -> WorldPos {
        (self + other) * 0.5
    }
}

impl Add for WorldPos {
    type Output = WorldPos;

    fn add(self, rhs: WorldPos) -> WorldPos {
        WorldPos::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Mul<f32> for WorldPos {
    type Output = WorldPos;

    fn mul(self, rhs: f32) -> WorldPos {
        WorldPos::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Width and height of the grid a snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridDims {
    pub width: i32,
    pub height: i32,
}

impl GridDims {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Whether `pos` lies inside `[0, width) x [0, height)`.
    #[inline]
    pub fn contains(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }
}

/// Reflect a coordinate across a grid axis of length `dim`.
///
/// An involution on `[0, dim)`: `mirror(mirror(c, d), d) == c`.
#[inline]
pub fn mirror(coord: i32, dim: i32) -> i32 {
    (dim - 1) - coord
}

/// Grid layout settings shared by every category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Size of one cell in world units.
    pub cell_size: f32,
    /// Base height of the floor plane.
    pub y_level: f32,
    /// World offset of the grid's (0, 0) corner.
    pub origin_offset: WorldPos,
    /// Flip the grid along x (`width - 1 - x`).
    pub mirror_x: bool,
    /// Flip the grid along z (`height - 1 - y`).
    pub mirror_z: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            y_level: 0.0,
            origin_offset: WorldPos::default(),
            mirror_x: true,
            mirror_z: false,
        }
    }
}

/// Maps grid cells of one snapshot generation into world space.
#[derive(Debug, Clone, Copy)]
pub struct GridMapper<'a> {
    config: &'a GridConfig,
    dims: GridDims,
}

impl<'a> GridMapper<'a> {
    pub fn new(config: &'a GridConfig, dims: GridDims) -> Self {
        Self { config, dims }
    }

    /// Apply the configured mirroring to a cell.
    #[inline]
    pub fn mirror(&self, pos: GridPos) -> GridPos {
        let x = if self.config.mirror_x { mirror(pos.x, self.dims.width) } else { pos.x };
        let y = if self.config.mirror_z { mirror(pos.y, self.dims.height) } else { pos.y };
        GridPos::new(x, y)
    }

    /// Center of an (already mirrored) cell in world space.
    #[inline]
    pub fn grid_to_world(&self, pos: GridPos) -> WorldPos {
        let half = self.config.cell_size * 0.5;
        let local = WorldPos::new(
            pos.x as f32 * self.config.cell_size + half,
            self.config.y_level,
            pos.y as f32 * self.config.cell_size + half,
        );
        local + self.config.origin_offset
    }

    /// Mirror then map a cell.
    #[inline]
    pub fn place(&self, pos: GridPos) -> WorldPos {
        self.grid_to_world(self.mirror(pos))
    }

    /// Midpoint of the edge between two cells, averaged in world space.
    pub fn place_edge(&self, a: GridPos, b: GridPos) -> WorldPos {
        self.place(a).midpoint(self.place(b))
    }
}
