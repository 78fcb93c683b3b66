//! Pose prediction for tracked objects.
//!
//! A [`PoseSimulator`] takes the current pose of every tracked object and
//! returns a predicted pose per id. The host picks the backend: a
//! hold-in-place backend for setups without a motion model, or a
//! constant-velocity drift backend that extrapolates the last observed
//! delta. Backends are interchangeable values, not subclasses of the
//! tracking driver.

use std::collections::HashMap;

use crate::error::Error;
use crate::params::SimParams;
use crate::pose::{normalize_angle, RigidPose};
use crate::track::Tracker;

/// Pose of one tracked object, keyed by its id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEntry {
    pub id: u64,
    pub pose: RigidPose,
}

/// Capability of producing a predicted pose per tracked object.
pub trait PoseSimulator {
    /// Predict the next pose for each entry. The returned list has one
    /// entry per input id, in input order.
    fn simulate(&mut self, poses: &[PoseEntry]) -> Vec<PoseEntry>;
}

/// Backend that predicts no motion at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldSimulator;

impl PoseSimulator for HoldSimulator {
    fn simulate(&mut self, poses: &[PoseEntry]) -> Vec<PoseEntry> {
        poses.to_vec()
    }
}

/// Constant-velocity backend: extrapolates each object's last observed
/// pose delta, scaled by a gain and clamped per frame.
#[derive(Debug, Clone)]
pub struct DriftSimulator {
    gain: f64,
    max_translation_step: f64,
    max_rotation_step: f64,
    history: HashMap<u64, RigidPose>,
}

impl DriftSimulator {
    /// Build from a parameter set; fails on any missing key.
    pub fn with_params(params: &SimParams) -> Result<Self, Error> {
        Ok(Self {
            gain: params.get("prediction_gain")?,
            max_translation_step: params.get("max_translation_step")?,
            max_rotation_step: params.get("max_rotation_step")?,
            history: HashMap::new(),
        })
    }
}

impl Default for DriftSimulator {
    fn default() -> Self {
        Self::with_params(&SimParams::default()).expect("default params are complete")
    }
}

impl PoseSimulator for DriftSimulator {
    fn simulate(&mut self, poses: &[PoseEntry]) -> Vec<PoseEntry> {
        let mut seen = HashMap::with_capacity(poses.len());
        let out = poses
            .iter()
            .map(|entry| {
                let predicted = match self.history.get(&entry.id) {
                    Some(prev) => {
                        let mut delta = entry.pose - *prev;
                        delta.rotation = (normalize_angle(delta.rotation) * self.gain)
                            .clamp(-self.max_rotation_step, self.max_rotation_step);
                        delta.tx *= self.gain;
                        delta.ty *= self.gain;
                        let len = delta.translation_len();
                        if len > self.max_translation_step {
                            let f = self.max_translation_step / len;
                            delta.tx *= f;
                            delta.ty *= f;
                        }
                        entry.pose + delta
                    }
                    // first sighting: nothing to extrapolate from
                    None => entry.pose,
                };
                seen.insert(entry.id, entry.pose);
                PoseEntry {
                    id: entry.id,
                    pose: predicted,
                }
            })
            .collect();
        // ids absent from this call are stale; drop their history
        self.history = seen;
        out
    }
}

/// Run one prediction pass over the tracker's active objects and write
/// the predicted poses back.
pub fn apply_predictions(tracker: &Tracker, simulator: &mut dyn PoseSimulator) {
    let entries: Vec<PoseEntry> = tracker
        .active_objects()
        .iter()
        .map(|o| PoseEntry {
            id: o.id,
            pose: o.pose,
        })
        .collect();
    for predicted in simulator.simulate(&entries) {
        // an object may have been evicted between snapshot and write-back
        let _ = tracker.set_predicted_pose(predicted.id, predicted.pose);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn entry(id: u64, rotation: f64, tx: f64, ty: f64) -> PoseEntry {
        PoseEntry {
            id,
            pose: RigidPose::new(rotation, tx, ty),
        }
    }

    #[test]
    fn hold_backend_returns_input() {
        let mut sim = HoldSimulator;
        let input = vec![entry(3, 0.2, 1.0, 2.0)];
        assert_eq!(sim.simulate(&input), input);
    }

    #[test]
    fn drift_extrapolates_last_delta() {
        let mut sim = DriftSimulator::default();
        let first = sim.simulate(&[entry(1, 0.0, 10.0, 10.0)]);
        assert_relative_eq!(first[0].pose.tx, 10.0);

        let second = sim.simulate(&[entry(1, 0.1, 11.0, 10.5)]);
        assert_relative_eq!(second[0].pose.rotation, 0.2, epsilon = 1e-12);
        assert_relative_eq!(second[0].pose.tx, 12.0, epsilon = 1e-12);
        assert_relative_eq!(second[0].pose.ty, 11.0, epsilon = 1e-12);
    }

    #[test]
    fn drift_clamps_large_steps() {
        let mut params = SimParams::default();
        params.set("max_translation_step", 5.0).unwrap();
        params.set("max_rotation_step", 0.1).unwrap();
        let mut sim = DriftSimulator::with_params(&params).unwrap();

        sim.simulate(&[entry(1, 0.0, 0.0, 0.0)]);
        let out = sim.simulate(&[entry(1, 1.0, 30.0, 40.0)]);
        // delta (30, 40) has length 50, clamped to 5 along the same ray
        assert_relative_eq!(out[0].pose.tx, 33.0, epsilon = 1e-12);
        assert_relative_eq!(out[0].pose.ty, 44.0, epsilon = 1e-12);
        assert_relative_eq!(out[0].pose.rotation, 1.1, epsilon = 1e-12);
    }

    #[test]
    fn stale_ids_lose_their_history() {
        let mut sim = DriftSimulator::default();
        sim.simulate(&[entry(1, 0.0, 0.0, 0.0)]);
        // id 1 absent here, so its velocity estimate must be forgotten
        sim.simulate(&[entry(2, 0.0, 0.0, 0.0)]);
        let out = sim.simulate(&[entry(1, 0.0, 7.0, 0.0)]);
        assert_relative_eq!(out[0].pose.tx, 7.0);
    }

    #[test]
    fn missing_param_fails_construction() {
        let mut incomplete = SimParams::empty();
        incomplete.define("prediction_gain", 1.0);
        assert!(matches!(
            DriftSimulator::with_params(&incomplete),
            Err(Error::UnknownParam(k)) if k == "max_translation_step"
        ));
        assert!(DriftSimulator::with_params(&SimParams::default()).is_ok());
    }

    #[test]
    fn predictions_flow_back_into_tracker() {
        use crate::library::ShapeLibrary;
        use crate::shape::Shape;
        use crate::track::TrackerConfig;

        let tracker = Tracker::new(
            ShapeLibrary::standard_tangram(10.0, None),
            TrackerConfig::default(),
        );
        let square = Shape::from_corners(vec![
            [5.0, 5.0],
            [15.0, 5.0],
            [15.0, 15.0],
            [5.0, 15.0],
        ]);
        tracker.process_shapes(&[square]);

        let mut sim = HoldSimulator;
        apply_predictions(&tracker, &mut sim);
        let snap = &tracker.active_objects()[0];
        let predicted = snap.predicted_pose.expect("prediction written back");
        assert_relative_eq!(predicted.tx, snap.pose.tx);
        assert_relative_eq!(predicted.ty, snap.pose.ty);
    }
}
