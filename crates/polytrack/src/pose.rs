//! Rigid 2D pose: rotation + translation.
//!
//! Poses compose additively (`+`/`-`), component by component. The tracker
//! integrates per-frame registration deltas this way on purpose: small
//! registration error then accumulates additively instead of compounding
//! multiplicatively, trading absolute positional accuracy for smooth
//! tracked motion.

use nalgebra::Matrix3;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Rotation (radians, counter-clockwise) plus translation.
///
/// An optional uniform scale is carried alongside the pose by the mapping
/// layer, not inside it; see [`crate::mapper::Mapping`].
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct RigidPose {
    /// Rotation angle in radians.
    pub rotation: f64,
    /// Translation along x.
    pub tx: f64,
    /// Translation along y.
    pub ty: f64,
}

impl RigidPose {
    pub fn new(rotation: f64, tx: f64, ty: f64) -> Self {
        Self { rotation, tx, ty }
    }

    /// Identity pose.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Length of the translation vector.
    pub fn translation_len(&self) -> f64 {
        (self.tx * self.tx + self.ty * self.ty).sqrt()
    }

    /// Homogeneous 3x3 transform for this pose.
    pub fn matrix(&self) -> Matrix3<f64> {
        self.matrix_scaled(1.0)
    }

    /// Homogeneous 3x3 transform with a uniform scale folded in.
    pub fn matrix_scaled(&self, scale: f64) -> Matrix3<f64> {
        let (sin, cos) = self.rotation.sin_cos();
        Matrix3::new(
            scale * cos,
            -scale * sin,
            self.tx,
            scale * sin,
            scale * cos,
            self.ty,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Apply rotation then translation to a point.
    pub fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        let (sin, cos) = self.rotation.sin_cos();
        [
            cos * p[0] - sin * p[1] + self.tx,
            sin * p[0] + cos * p[1] + self.ty,
        ]
    }
}

impl Add for RigidPose {
    type Output = RigidPose;

    fn add(self, other: RigidPose) -> RigidPose {
        RigidPose::new(
            self.rotation + other.rotation,
            self.tx + other.tx,
            self.ty + other.ty,
        )
    }
}

impl AddAssign for RigidPose {
    fn add_assign(&mut self, other: RigidPose) {
        self.rotation += other.rotation;
        self.tx += other.tx;
        self.ty += other.ty;
    }
}

impl Sub for RigidPose {
    type Output = RigidPose;

    fn sub(self, other: RigidPose) -> RigidPose {
        RigidPose::new(
            self.rotation - other.rotation,
            self.tx - other.tx,
            self.ty - other.ty,
        )
    }
}

impl SubAssign for RigidPose {
    fn sub_assign(&mut self, other: RigidPose) {
        self.rotation -= other.rotation;
        self.tx -= other.tx;
        self.ty -= other.ty;
    }
}

/// Wrap an angle into (-pi, pi].
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % std::f64::consts::TAU;
    if a <= -std::f64::consts::PI {
        a += std::f64::consts::TAU;
    } else if a > std::f64::consts::PI {
        a -= std::f64::consts::TAU;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn compose_and_invert() {
        let a = RigidPose::new(0.1, 2.0, -1.0);
        let b = RigidPose::new(-0.05, 0.5, 0.5);
        let c = a + b;
        assert_relative_eq!(c.rotation, 0.05);
        assert_relative_eq!(c.tx, 2.5);
        assert_relative_eq!(c.ty, -0.5);
        let back = c - b;
        assert_relative_eq!(back.rotation, a.rotation);
        assert_relative_eq!(back.tx, a.tx);
        assert_relative_eq!(back.ty, a.ty);
    }

    #[test]
    fn apply_quarter_turn() {
        let pose = RigidPose::new(FRAC_PI_2, 1.0, 0.0);
        let p = pose.apply([1.0, 0.0]);
        assert_relative_eq!(p[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn matrix_matches_apply() {
        let pose = RigidPose::new(0.3, -2.0, 4.0);
        let m = pose.matrix();
        let v = m * nalgebra::Vector3::new(1.5, -0.5, 1.0);
        let p = pose.apply([1.5, -0.5]);
        assert_relative_eq!(v[0], p[0], epsilon = 1e-12);
        assert_relative_eq!(v[1], p[1], epsilon = 1e-12);
    }

    #[test]
    fn angle_normalization() {
        assert_relative_eq!(normalize_angle(3.0 * PI), PI);
        assert_relative_eq!(normalize_angle(-3.0 * PI), PI);
        assert_relative_eq!(normalize_angle(0.25), 0.25);
    }
}
