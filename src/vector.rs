//! 3D turbine positions and the 2D flow-frame rotation.
//!
//! Positions are kept as plain `f64` triples; the rotation is stored as its
//! cosine/sine pair and only expanded into a matrix when a caller asks for one.

use ndarray::{Array2, array};

use crate::constants::FLOW_FRAME_OFFSET_DEG;

/// 3D point or displacement in the global farm frame (m).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    /// East (m)
    pub x: f64,
    /// North (m)
    pub y: f64,
    /// Height (m)
    pub z: f64,
}

impl Vec3 {
    /// Creates a new vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector.
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Element-wise subtraction.
    #[inline(always)]
    pub fn sub(&self, other: &Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Component by axis index (0 = x, 1 = y, 2 = z).
    #[inline(always)]
    pub fn component(&self, axis: usize) -> f64 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

/// Rotation from global (x, y) into the flow-aligned frame.
///
/// `angle = radians(270 - wd)`, `R = [[cos, sin], [-sin, cos]]`. The first
/// flow axis points downwind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowRotation {
    cos: f64,
    sin: f64,
}

impl FlowRotation {
    /// Rotation for a meteorological wind direction in degrees.
    ///
    /// Directions are reduced modulo 360 first so that `wd` and `wd + 360`
    /// produce bit-identical rotations.
    pub fn from_wind_direction(wind_direction_deg: f64) -> Self {
        let angle = (FLOW_FRAME_OFFSET_DEG - wind_direction_deg.rem_euclid(360.0)).to_radians();
        Self {
            cos: angle.cos(),
            sin: angle.sin(),
        }
    }

    /// Rotate a single horizontal vector.
    #[inline(always)]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.cos * x + self.sin * y, -self.sin * x + self.cos * y)
    }

    /// The 2×2 rotation matrix.
    pub fn matrix(&self) -> Array2<f64> {
        array![[self.cos, self.sin], [-self.sin, self.cos]]
    }
}
