//! Scalar and small-vector math for DSP.
//!
//! Level conversions, time conversions, interpolation, and the 3-vector /
//! 3×3-matrix types used by the spatializer's world transform. All scalar
//! transcendentals go through `libm` so results are identical across
//! platforms.

use libm::{expf, logf, sqrtf};

/// Convert decibels to linear amplitude.
///
/// 0 dB → 1.0, −6.02 dB → 0.5, +6.02 dB → 2.0. `-inf` maps to 0.0, which is
/// how "muted" dry/wet gains are expressed.
#[inline]
pub fn db_to_amp(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear amplitude to decibels.
///
/// Amplitudes at or below zero are floored to avoid `-inf`/NaN; the floor
/// corresponds to roughly −200 dB.
#[inline]
pub fn amp_to_db(amp: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(amp.max(1e-10)) * FACTOR
}

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Convert milliseconds to a (fractional) sample count.
#[inline]
pub fn ms_to_samples(ms: f32, samplerate: f32) -> f32 {
    ms * samplerate / 1000.0
}

/// Convert a sample count to milliseconds.
#[inline]
pub fn samples_to_ms(samples: f32, samplerate: f32) -> f32 {
    samples * 1000.0 / samplerate
}

/// 3-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    /// X component (right).
    pub x: f32,
    /// Y component (up).
    pub y: f32,
    /// Z component (forward).
    pub z: f32,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Construct from components.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise addition.
    #[inline]
    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    /// Component-wise subtraction.
    #[inline]
    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Euclidean length.
    #[inline]
    pub fn length(self) -> f32 {
        sqrtf(self.dot(self))
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    #[inline]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len > 1e-9 { self.scale(1.0 / len) } else { Self::ZERO }
    }

    /// Linear interpolation between two points.
    #[inline]
    pub fn lerp(a: Self, b: Self, t: f32) -> Self {
        a.add(b.sub(a).scale(t))
    }
}

/// Row-major 3×3 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    /// Rows of the matrix.
    pub rows: [Vec3; 3],
}

impl Mat3 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        rows: [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ],
    };

    /// Multiply a row vector by this matrix (`v * M`).
    #[inline]
    pub fn transform(&self, v: Vec3) -> Vec3 {
        Vec3::new(
            v.x * self.rows[0].x + v.y * self.rows[1].x + v.z * self.rows[2].x,
            v.x * self.rows[0].y + v.y * self.rows[1].y + v.z * self.rows[2].y,
            v.x * self.rows[0].z + v.y * self.rows[1].z + v.z * self.rows[2].z,
        )
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_round_trip() {
        for db in [-24.0_f32, -6.0, 0.0, 6.0, 12.0] {
            let amp = db_to_amp(db);
            assert!((amp_to_db(amp) - db).abs() < 1e-3, "round trip at {db} dB");
        }
    }

    #[test]
    fn db_reference_points() {
        assert!((db_to_amp(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_amp(-6.0206) - 0.5).abs() < 1e-3);
        assert_eq!(db_to_amp(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn ms_samples_round_trip() {
        let samples = ms_to_samples(300.0, 48000.0);
        assert!((samples - 14400.0).abs() < 1e-3);
        assert!((samples_to_ms(samples, 48000.0) - 300.0).abs() < 1e-3);
    }

    #[test]
    fn identity_transform() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let out = Mat3::IDENTITY.transform(v);
        assert_eq!(out, v);
    }

    #[test]
    fn normalize_zero_is_zero() {
        assert_eq!(Vec3::ZERO.normalized(), Vec3::ZERO);
    }
}
