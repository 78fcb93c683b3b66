//! Rigid registration of one polygon onto another.
//!
//! Corner correspondence between the two polygons is unknown, so every
//! target corner is tried as the alignment anchor for the model's first
//! corner. This brute force is O(corners^2) per pair and is only viable
//! because detected polygons have few corners (<= 6 or so); it does not
//! scale to high-vertex polygons.

use crate::pose::{normalize_angle, RigidPose};
use crate::shape::Shape;

/// Registration settings.
#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Corner-distance tolerance as a fraction of the model diagonal.
    /// A candidate is accepted when its symmetric nearest-neighbor error
    /// stays below `(tolerance * diagonal * scale)^2 * corner_count`.
    pub tolerance: f64,
    /// Estimate a uniform scale per anchor hypothesis instead of
    /// registering at fixed size.
    pub use_scaling: bool,
    /// Upper bound on `|rotation|` (radians) accepted by
    /// [`best_mapping`]. `None` means unbounded.
    pub max_rotation: Option<f64>,
    /// Upper bound on the translation length accepted by
    /// [`best_mapping`]. `None` means unbounded.
    pub max_translation: Option<f64>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            use_scaling: false,
            max_rotation: None,
            max_translation: None,
        }
    }
}

/// One accepted registration candidate.
#[derive(Debug, Clone)]
pub struct Mapping {
    /// Transform taking the model onto the target (rotation and scale
    /// around the model centroid, then translation).
    pub pose: RigidPose,
    /// Uniform scale factor; 1 unless scaling was enabled.
    pub scale: f64,
    /// The model template this candidate maps.
    pub model: Shape,
    /// Symmetric nearest-neighbor error of the candidate.
    pub error: f64,
}

impl Mapping {
    /// Mean distance the model corners travel under this transform. Used
    /// to rank candidates: among acceptable registrations the one moving
    /// the object least is the most plausible.
    pub fn mean_corner_movement(&self) -> f64 {
        self.model
            .mean_corner_distance(&self.model.transformed(&self.pose, self.scale))
    }

    fn within_bounds(&self, cfg: &MapConfig) -> bool {
        if let Some(max_rot) = cfg.max_rotation {
            if normalize_angle(self.pose.rotation).abs() > max_rot {
                return false;
            }
        }
        if let Some(max_trans) = cfg.max_translation {
            if self.pose.translation_len() > max_trans {
                return false;
            }
        }
        true
    }
}

/// Sum of squared distances from each point of `from` to its nearest
/// point in `to`.
fn nearest_neighbor_error(from: &[[f64; 2]], to: &[[f64; 2]]) -> f64 {
    from.iter()
        .map(|p| {
            to.iter()
                .map(|q| {
                    let dx = p[0] - q[0];
                    let dy = p[1] - q[1];
                    dx * dx + dy * dy
                })
                .fold(f64::INFINITY, f64::min)
        })
        .sum()
}

/// Register `model` onto `target`, returning every candidate whose error
/// passes the dynamic threshold, in anchor order (one hypothesis per
/// target corner).
///
/// The transform of each candidate first aligns the model centroid with
/// the target centroid, then rotates (and optionally scales) so that the
/// model's first corner lands on the anchor corner.
pub fn map_shape(target: &Shape, model: &Shape, cfg: &MapConfig) -> Vec<Mapping> {
    let mut maps = Vec::new();
    if !target.has_corners() || !model.has_corners() {
        return maps;
    }

    let cm = model.centroid();
    let ct = target.centroid();
    let tx = ct[0] - cm[0];
    let ty = ct[1] - cm[1];

    let anchor = model.corners()[0];
    let anchor_dx = anchor[0] - cm[0];
    let anchor_dy = anchor[1] - cm[1];
    let anchor_dist2 = anchor_dx * anchor_dx + anchor_dy * anchor_dy;
    let angle_m = anchor_dy.atan2(anchor_dx);

    for corner in target.corners() {
        let dx = corner[0] - ct[0];
        let dy = corner[1] - ct[1];
        let scale = if cfg.use_scaling {
            if anchor_dist2 < f64::EPSILON {
                continue;
            }
            ((dx * dx + dy * dy) / anchor_dist2).sqrt()
        } else {
            1.0
        };
        let theta = normalize_angle(dy.atan2(dx) - angle_m);
        let pose = RigidPose::new(theta, tx, ty);

        let transformed = model.transformed(&pose, scale);
        let error = nearest_neighbor_error(target.corners(), transformed.corners())
            + nearest_neighbor_error(transformed.corners(), target.corners());

        let threshold = (cfg.tolerance * model.diagonal() * scale).powi(2)
            * model.corner_count() as f64;
        if error <= threshold {
            maps.push(Mapping {
                pose,
                scale,
                model: model.clone(),
                error,
            });
        }
    }
    maps
}

/// Register each model onto the target and concatenate the candidates in
/// model order.
pub fn map_shapes<'a>(
    target: &Shape,
    models: impl IntoIterator<Item = &'a Shape>,
    cfg: &MapConfig,
) -> Vec<Mapping> {
    models
        .into_iter()
        .flat_map(|model| map_shape(target, model, cfg))
        .collect()
}

/// Sort candidates ascending by registration error.
pub fn sort_by_error(maps: &mut [Mapping]) {
    maps.sort_by(|a, b| a.error.total_cmp(&b.error));
}

/// Index of the candidate whose corners travel the smallest mean distance,
/// considering only candidates within the configured rotation/translation
/// bounds. Ties keep the first index encountered; identity assignment in
/// the tracker depends on this being deterministic. `None` when no
/// candidate qualifies, which is a normal outcome, not an error.
pub fn best_mapping(candidates: &[Mapping], cfg: &MapConfig) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        if !candidate.within_bounds(cfg) {
            continue;
        }
        let movement = candidate.mean_corner_movement();
        if best.map_or(true, |(_, d)| movement < d) {
            best = Some((i, movement));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> Shape {
        Shape::from_corners(vec![[-0.5, -0.5], [-0.5, 0.5], [0.5, 0.5], [0.5, -0.5]])
    }

    fn right_triangle() -> Shape {
        Shape::from_corners(vec![[0.0, 0.0], [4.0, 0.0], [0.0, 3.0]])
    }

    #[test]
    fn identity_registration() {
        let sq = unit_square();
        let maps = map_shape(&sq, &sq, &MapConfig::default());
        assert!(!maps.is_empty());
        let best = &maps[best_mapping(&maps, &MapConfig::default()).unwrap()];
        assert_relative_eq!(best.pose.rotation, 0.0, epsilon = 1e-9);
        assert_relative_eq!(best.pose.translation_len(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(best.error, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn translated_square_recovers_offset() {
        let model = unit_square();
        let mut target = unit_square();
        target.translate(10.0, 10.0);
        let cfg = MapConfig::default();
        let maps = map_shape(&target, &model, &cfg);
        let best = &maps[best_mapping(&maps, &cfg).unwrap()];
        // all four anchors fit a square; least corner movement means the
        // unrotated one wins
        assert_relative_eq!(best.pose.rotation, 0.0, epsilon = 1e-9);
        assert_relative_eq!(best.pose.tx, 10.0, epsilon = 1e-9);
        assert_relative_eq!(best.pose.ty, 10.0, epsilon = 1e-9);
        assert_relative_eq!(best.error, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn rotation_is_recovered() {
        let model = right_triangle();
        let target = model.transformed(&RigidPose::new(0.5, 0.0, 0.0), 1.0);
        let cfg = MapConfig::default();
        let maps = map_shape(&target, &model, &cfg);
        let best = &maps[best_mapping(&maps, &cfg).unwrap()];
        assert_relative_eq!(best.pose.rotation, 0.5, epsilon = 1e-9);
        assert_relative_eq!(best.error, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn uniform_scale_is_recovered() {
        let model = right_triangle();
        let mut target = right_triangle();
        target.scale(2.0, false);
        let cfg = MapConfig {
            use_scaling: true,
            ..MapConfig::default()
        };
        let maps = map_shape(&target, &model, &cfg);
        let best = &maps[best_mapping(&maps, &cfg).unwrap()];
        assert_relative_eq!(best.scale, 2.0, epsilon = 1e-9);
        assert_relative_eq!(best.error, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn error_is_equivariant_under_common_rigid_motion() {
        let model = right_triangle();
        let mut target = right_triangle();
        target.translate(0.1, -0.05);
        let cfg = MapConfig {
            tolerance: 1.0,
            ..MapConfig::default()
        };
        let before: Vec<f64> = map_shape(&target, &model, &cfg)
            .iter()
            .map(|m| m.error)
            .collect();

        let motion = RigidPose::new(0.7, 15.0, -3.0);
        let moved_model = model.transformed(&motion, 1.0);
        let moved_target = target.transformed(&motion, 1.0);
        let after: Vec<f64> = map_shape(&moved_target, &moved_model, &cfg)
            .iter()
            .map(|m| m.error)
            .collect();

        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn bounds_reject_every_candidate() {
        let model = unit_square();
        let mut target = unit_square();
        target.translate(10.0, 10.0);
        let loose = MapConfig::default();
        let maps = map_shape(&target, &model, &loose);
        assert!(!maps.is_empty());
        let tight = MapConfig {
            max_translation: Some(1.0),
            ..MapConfig::default()
        };
        assert_eq!(best_mapping(&maps, &tight), None);
    }

    #[test]
    fn equal_candidates_keep_first_index() {
        let sq = unit_square();
        let maps = map_shape(&sq, &sq, &MapConfig::default());
        let twin = vec![maps[0].clone(), maps[0].clone()];
        assert_eq!(best_mapping(&twin, &MapConfig::default()), Some(0));
    }

    #[test]
    fn sort_orders_by_error() {
        let model = unit_square();
        let mut target = unit_square();
        target.translate(0.02, 0.01);
        let cfg = MapConfig::default();
        let mut maps = map_shapes(&target, [&model], &cfg);
        sort_by_error(&mut maps);
        for w in maps.windows(2) {
            assert!(w[0].error <= w[1].error);
        }
    }

    #[test]
    fn empty_shapes_yield_no_candidates() {
        let empty = Shape::new("", 1.0);
        assert!(map_shape(&empty, &unit_square(), &MapConfig::default()).is_empty());
        assert!(map_shape(&unit_square(), &empty, &MapConfig::default()).is_empty());
    }
}
