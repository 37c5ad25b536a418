//! Listener context for spatialized sources.

use crate::math::{Mat3, Vec3};

/// Where the listener is and how sound propagates.
///
/// Passed explicitly through spatializer configuration; there is no
/// process-wide default instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct World {
    /// Position of the listener's ears.
    pub origin: Vec3,
    /// Listener orientation; must be orthonormal.
    pub orientation: Mat3,
    /// Speed of sound in units per second. The default is 343 (dry air at
    /// 20 °C, in m/s).
    pub speed_of_sound: f32,
}

impl Default for World {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            orientation: Mat3::IDENTITY,
            speed_of_sound: 343.0,
        }
    }
}

impl World {
    /// Transform a world-space point into the listener's frame.
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.orientation.transform(point.sub(self.origin))
    }
}
