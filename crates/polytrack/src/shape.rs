//! Polygon shape with derived geometry.
//!
//! A [`Shape`] owns ordered polygon corners and keeps centroid, signed
//! area (shoelace formula) and axis-aligned bounding box consistent with
//! them: every mutation path recomputes the derived attributes eagerly, so
//! no reader can ever observe stale geometry.

use nalgebra::{Matrix3, Vector3};

use crate::pose::RigidPose;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Aabb {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb {
    /// Smallest box containing all points; zero box for an empty slice.
    pub fn from_points(points: &[[f64; 2]]) -> Self {
        let mut iter = points.iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };
        let mut b = Self {
            min: *first,
            max: *first,
        };
        for p in iter {
            b.min[0] = b.min[0].min(p[0]);
            b.min[1] = b.min[1].min(p[1]);
            b.max[0] = b.max[0].max(p[0]);
            b.max[1] = b.max[1].max(p[1]);
        }
        b
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    /// Length of the box diagonal.
    pub fn diagonal(&self) -> f64 {
        let w = self.width();
        let h = self.height();
        (w * w + h * h).sqrt()
    }
}

/// Named ordered polygon with derived centroid, area and bounding box.
///
/// The `height` scalar is carried along for downstream 3D model building
/// (e.g. extruding the polygon for a physics engine); the 2D geometry
/// never reads it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    name: String,
    height: f64,
    corners: Vec<[f64; 2]>,
    centroid: [f64; 2],
    signed_area: f64,
    bbox: Aabb,
}

impl Shape {
    /// Empty shape with a name and height.
    pub fn new(name: impl Into<String>, height: f64) -> Self {
        Self {
            name: name.into(),
            height,
            ..Self::default()
        }
    }

    /// Unnamed shape (height 1) from ordered corners.
    pub fn from_corners(corners: Vec<[f64; 2]>) -> Self {
        let mut shape = Self::new("", 1.0);
        shape.set_corners(corners);
        shape
    }

    /// Named shape from ordered corners and a height.
    pub fn with_corners(name: impl Into<String>, height: f64, corners: Vec<[f64; 2]>) -> Self {
        let mut shape = Self::new(name, height);
        shape.set_corners(corners);
        shape
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn set_height(&mut self, height: f64) {
        self.height = height;
    }

    pub fn corners(&self) -> &[[f64; 2]] {
        &self.corners
    }

    pub fn corner_count(&self) -> usize {
        self.corners.len()
    }

    pub fn has_corners(&self) -> bool {
        !self.corners.is_empty()
    }

    /// Append one corner; derived geometry is recomputed immediately.
    pub fn push_corner(&mut self, corner: [f64; 2]) {
        self.corners.push(corner);
        self.update_geometry();
    }

    /// Replace all corners.
    pub fn set_corners(&mut self, corners: Vec<[f64; 2]>) {
        self.corners = corners;
        self.update_geometry();
    }

    /// Remove all corners; centroid, area and bounding box reset to zero.
    pub fn clear_corners(&mut self) {
        self.corners.clear();
        self.update_geometry();
    }

    /// Center of gravity of the polygon.
    pub fn centroid(&self) -> [f64; 2] {
        self.centroid
    }

    /// Unsigned polygon area.
    pub fn area(&self) -> f64 {
        self.signed_area.abs()
    }

    /// Shoelace area with its sign: positive for counter-clockwise corner
    /// winding, negative for clockwise. Callers must not assume a fixed
    /// winding without checking.
    pub fn signed_area(&self) -> f64 {
        self.signed_area
    }

    /// Extruded volume (`height * area`).
    pub fn volume(&self) -> f64 {
        self.height * self.area()
    }

    pub fn bbox(&self) -> Aabb {
        self.bbox
    }

    /// Length of the bounding-box diagonal.
    pub fn diagonal(&self) -> f64 {
        self.bbox.diagonal()
    }

    /// Transform every corner with `m`, relative to the shape's own
    /// centroid: `p' = M * (p - c) + c`. A translation part of `m` thus
    /// moves the whole shape while rotation and scale pivot around the
    /// centroid. Derived geometry is recomputed before returning.
    pub fn transform_around_center(&mut self, m: &Matrix3<f64>) {
        let c = self.centroid;
        for p in &mut self.corners {
            let v = m * Vector3::new(p[0] - c[0], p[1] - c[1], 1.0);
            p[0] = v[0] + c[0];
            p[1] = v[1] + c[1];
        }
        self.update_geometry();
    }

    /// Apply a rigid pose (with uniform scale) around the centroid.
    pub fn apply_pose(&mut self, pose: &RigidPose, scale: f64) {
        self.transform_around_center(&pose.matrix_scaled(scale));
    }

    /// Copy of this shape with a pose applied around the centroid.
    pub fn transformed(&self, pose: &RigidPose, scale: f64) -> Shape {
        let mut out = self.clone();
        out.apply_pose(pose, scale);
        out
    }

    /// Scale the polygon relative to its centroid. The height is only
    /// scaled when `scale_height` is set.
    pub fn scale(&mut self, s: f64, scale_height: bool) {
        if scale_height {
            self.height *= s;
        }
        self.transform_around_center(&RigidPose::identity().matrix_scaled(s));
    }

    /// Translate the polygon.
    pub fn translate(&mut self, tx: f64, ty: f64) {
        for p in &mut self.corners {
            p[0] += tx;
            p[1] += ty;
        }
        self.update_geometry();
    }

    /// Mean euclidean distance between corresponding corner pairs of the
    /// two shapes (up to the shorter corner list). Zero when either shape
    /// has no corners.
    pub fn mean_corner_distance(&self, other: &Shape) -> f64 {
        let n = self.corners.len().min(other.corners.len());
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = self.corners[..n]
            .iter()
            .zip(&other.corners[..n])
            .map(|(a, b)| {
                let dx = a[0] - b[0];
                let dy = a[1] - b[1];
                (dx * dx + dy * dy).sqrt()
            })
            .sum();
        sum / n as f64
    }

    /// Recompute centroid, signed area and bounding box from the corners.
    ///
    /// Shoelace formula; only correct for non-self-intersecting polygons.
    /// Degenerate polygons (fewer than 3 corners, or collinear) get zero
    /// area and the vertex mean as centroid.
    fn update_geometry(&mut self) {
        let n = self.corners.len();
        if n == 0 {
            self.centroid = [0.0, 0.0];
            self.signed_area = 0.0;
            self.bbox = Aabb::default();
            return;
        }
        let mut twice_area = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let [x, y] = self.corners[i];
            let [xn, yn] = self.corners[(i + 1) % n];
            let cross = x * yn - xn * y;
            twice_area += cross;
            cx += (x + xn) * cross;
            cy += (y + yn) * cross;
        }
        if twice_area.abs() > f64::EPSILON {
            self.centroid = [cx / (3.0 * twice_area), cy / (3.0 * twice_area)];
        } else {
            let inv = 1.0 / n as f64;
            self.centroid = [
                self.corners.iter().map(|p| p[0]).sum::<f64>() * inv,
                self.corners.iter().map(|p| p[1]).sum::<f64>() * inv,
            ];
        }
        self.signed_area = twice_area / 2.0;
        self.bbox = Aabb::from_points(&self.corners);
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Shape(name={:?}, centroid=({:.2}, {:.2}), area={:.2}, corners={})",
            self.name,
            self.centroid[0],
            self.centroid[1],
            self.area(),
            self.corners.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    fn unit_square() -> Shape {
        Shape::from_corners(vec![[-0.5, -0.5], [0.5, -0.5], [0.5, 0.5], [-0.5, 0.5]])
    }

    #[test]
    fn square_area_and_centroid() {
        let sq = unit_square();
        assert_relative_eq!(sq.area(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(sq.centroid()[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(sq.centroid()[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(sq.diagonal(), 2f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn winding_shows_in_signed_area() {
        let ccw = unit_square();
        assert!(ccw.signed_area() > 0.0);
        let mut corners = ccw.corners().to_vec();
        corners.reverse();
        let cw = Shape::from_corners(corners);
        assert!(cw.signed_area() < 0.0);
        assert_relative_eq!(cw.area(), ccw.area(), epsilon = 1e-12);
    }

    #[test]
    fn translate_moves_all_derived_geometry() {
        let mut sq = unit_square();
        sq.translate(3.0, -2.0);
        assert_relative_eq!(sq.centroid()[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(sq.centroid()[1], -2.0, epsilon = 1e-12);
        assert_relative_eq!(sq.bbox().min[0], 2.5, epsilon = 1e-12);
        assert_relative_eq!(sq.area(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rotation_around_center_preserves_area_and_centroid() {
        let mut sq = unit_square();
        sq.translate(5.0, 5.0);
        sq.apply_pose(&RigidPose::new(FRAC_PI_4, 0.0, 0.0), 1.0);
        assert_relative_eq!(sq.centroid()[0], 5.0, epsilon = 1e-9);
        assert_relative_eq!(sq.centroid()[1], 5.0, epsilon = 1e-9);
        assert_relative_eq!(sq.area(), 1.0, epsilon = 1e-9);
        // 45 degrees turns the bbox diagonal into sqrt(2) * side
        assert_relative_eq!(sq.bbox().width(), 2f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn pose_translation_moves_shape() {
        let mut sq = unit_square();
        sq.apply_pose(&RigidPose::new(0.0, 10.0, 10.0), 1.0);
        assert_relative_eq!(sq.centroid()[0], 10.0, epsilon = 1e-12);
        assert_relative_eq!(sq.centroid()[1], 10.0, epsilon = 1e-12);
    }

    #[test]
    fn scale_without_height() {
        let mut sq = unit_square();
        sq.set_height(7.0);
        sq.scale(2.0, false);
        assert_relative_eq!(sq.area(), 4.0, epsilon = 1e-12);
        assert_relative_eq!(sq.height(), 7.0);
        sq.scale(2.0, true);
        assert_relative_eq!(sq.height(), 14.0);
    }

    #[test]
    fn mean_corner_distance_of_translated_copy() {
        let sq = unit_square();
        let mut moved = sq.clone();
        moved.translate(3.0, 4.0);
        assert_relative_eq!(sq.mean_corner_distance(&moved), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_polygons_do_not_panic() {
        let line = Shape::from_corners(vec![[0.0, 0.0], [1.0, 0.0]]);
        assert_relative_eq!(line.area(), 0.0);
        assert_relative_eq!(line.centroid()[0], 0.5, epsilon = 1e-12);
        let empty = Shape::new("empty", 1.0);
        assert_relative_eq!(empty.area(), 0.0);
        assert!(!empty.has_corners());
    }
}
