//! Small f64 vector types used by the builder and the follower.
//!
//! World space is right-handed with Y up. The track heading lives in the
//! XZ plane, so [`Vector2`] stores `(x, z)` as `(x, y)`.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// Planar vector. Used for the track heading in the XZ plane.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Unit heading pointing down the track at position zero.
    pub const FORWARD: Self = Self::new(0.0, 1.0);

    pub fn magnitude(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the unit vector, or `self` unchanged when it has zero length.
    pub fn normalize(self) -> Self {
        let t = self.x * self.x + self.y * self.y;
        if t == 0.0 {
            return self;
        }
        let t = 1.0 / t.sqrt();
        Self::new(self.x * t, self.y * t)
    }

    /// Rotates counter-clockwise by the angle whose cosine and sine are given.
    pub fn rotate(self, cos: f64, sin: f64) -> Self {
        Self::new(cos * self.x - sin * self.y, sin * self.x + cos * self.y)
    }
}

impl Default for Vector2 {
    fn default() -> Self {
        Self::ZERO
    }
}

/// 3D vector with f64 components.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);
    pub const RIGHT: Self = Self::new(1.0, 0.0, 0.0);
    pub const FORWARD: Self = Self::new(0.0, 0.0, 1.0);

    /// Lifts a planar heading into 3D with the given gradient and normalizes.
    pub fn from_heading(heading: Vector2, pitch: f64) -> Self {
        Self::new(heading.x, pitch, heading.y).normalize()
    }

    pub fn magnitude(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Returns the unit vector, or `self` unchanged when it has zero length.
    pub fn normalize(self) -> Self {
        let t = self.x * self.x + self.y * self.y + self.z * self.z;
        if t == 0.0 {
            return self;
        }
        self * (1.0 / t.sqrt())
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Rotates about an arbitrary unit axis.
    pub fn rotate(self, axis: Self, cos: f64, sin: f64) -> Self {
        let oc = 1.0 - cos;
        let (dx, dy, dz) = (axis.x, axis.y, axis.z);
        Self::new(
            (cos + oc * dx * dx) * self.x
                + (oc * dx * dy - sin * dz) * self.y
                + (oc * dx * dz + sin * dy) * self.z,
            (oc * dy * dx + sin * dz) * self.x
                + (cos + oc * dy * dy) * self.y
                + (oc * dy * dz - sin * dx) * self.z,
            (oc * dz * dx - sin * dy) * self.x
                + (oc * dz * dy + sin * dx) * self.y
                + (cos + oc * dz * dz) * self.z,
        )
    }

    /// Rotates within the XZ plane, leaving Y untouched.
    pub fn rotate_plane(self, cos: f64, sin: f64) -> Self {
        Self::new(
            self.x * cos - self.z * sin,
            self.y,
            self.x * sin + self.z * cos,
        )
    }
}

impl Add for Vector3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Vector3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Neg for Vector3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Default for Vector3 {
    fn default() -> Self {
        Self::ZERO
    }
}
