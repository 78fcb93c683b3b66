//! Multi-object identity tracking over per-frame polygon observations.
//!
//! The tracker owns a pool of tracked objects behind a mutex so that a
//! consumer thread (rendering, prediction, a downstream simulator) can
//! read active objects while the detection loop writes. Corner detection
//! and registration run on a pool snapshot outside the lock; each frame
//! is then committed in a single critical section, so readers never see
//! a partially processed frame.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::contour::Contour;
use crate::corner::{detect_corners, CssConfig};
use crate::error::Error;
use crate::library::{ClassifyConfig, ShapeLibrary};
use crate::mapper::{self, MapConfig, Mapping};
use crate::pose::RigidPose;
use crate::shape::Shape;

/// Tracker settings.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Corner detector parameters for [`Tracker::process_frame`].
    pub detector: CssConfig,
    /// Library pre-filter for unclaimed observations.
    pub classify: ClassifyConfig,
    /// Registration settings for matching observations against objects
    /// already in the pool (frame-to-frame motion).
    pub track_map: MapConfig,
    /// Registration settings for matching unclaimed observations against
    /// the template library.
    pub library_map: MapConfig,
    /// Frames an object may stay unobserved before it is evicted.
    pub forget_age: u64,
    /// Observations with more corners than this are dropped; the
    /// brute-force registration does not scale past small polygons.
    pub max_corners: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            detector: CssConfig::default(),
            classify: ClassifyConfig::default(),
            track_map: MapConfig::default(),
            library_map: MapConfig::default(),
            forget_age: 20,
            max_corners: 5,
        }
    }
}

/// Mapping applied to detected corner points before classification,
/// e.g. a screen-to-world calibration. All shapes compared within one
/// registration call must live in the same frame of reference, so the
/// mapping runs on raw detections, never on pool state.
pub trait CornerMapper {
    fn map_point(&self, p: [f64; 2]) -> [f64; 2];
}

/// No-op corner mapping; detections stay in contour coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl CornerMapper for IdentityMapper {
    fn map_point(&self, p: [f64; 2]) -> [f64; 2] {
        p
    }
}

/// One identity in the pool.
///
/// The template shape is kept at library scale; `pose` accumulates the
/// per-frame registration deltas additively, so the current outline is
/// always `shape` transformed by `pose`.
#[derive(Debug, Clone)]
struct TrackedObject {
    id: u64,
    shape: Shape,
    pose: RigidPose,
    scale: f64,
    error: f64,
    mass: f64,
    predicted_pose: Option<RigidPose>,
    last_active: u64,
}

impl TrackedObject {
    fn transformed_shape(&self) -> Shape {
        self.shape.transformed(&self.pose, self.scale)
    }
}

/// Read-only copy of one tracked object, taken under the pool lock.
#[derive(Debug, Clone)]
pub struct TrackSnapshot {
    pub id: u64,
    pub name: String,
    pub pose: RigidPose,
    pub scale: f64,
    /// Template outline with the current pose applied.
    pub shape: Shape,
    pub error: f64,
    /// Mass handed to downstream physics model building; tracking never
    /// reads it.
    pub mass: f64,
    pub predicted_pose: Option<RigidPose>,
    pub last_active: u64,
}

/// Per-frame bookkeeping returned by the processing calls.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct FrameSummary {
    pub frame: u64,
    /// Observations that passed the corner-count gate.
    pub observed: usize,
    /// Observations claimed by an existing object.
    pub matched: usize,
    /// New identities allocated this frame.
    pub created: usize,
    /// Objects forgotten at the end of the frame.
    pub evicted: usize,
}

struct PoolState {
    objects: Vec<TrackedObject>,
    next_id: u64,
    frame: u64,
    library: ShapeLibrary,
}

/// Cloneable handle to a shared tracking pool.
#[derive(Clone)]
pub struct Tracker {
    config: TrackerConfig,
    state: Arc<Mutex<PoolState>>,
}

impl Tracker {
    pub fn new(library: ShapeLibrary, config: TrackerConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(PoolState {
                objects: Vec::new(),
                next_id: 0,
                frame: 0,
                library,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().expect("tracker pool lock poisoned")
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Current frame counter.
    pub fn frame(&self) -> u64 {
        self.lock().frame
    }

    /// Run corner detection on each contour and feed the resulting
    /// polygons through one tracking frame.
    pub fn process_frame(&self, contours: &[Contour]) -> FrameSummary {
        self.process_frame_mapped(contours, &IdentityMapper)
    }

    /// [`Tracker::process_frame`] with a coordinate mapping applied to
    /// the detected corners, e.g. screen to world.
    pub fn process_frame_mapped(
        &self,
        contours: &[Contour],
        mapper: &dyn CornerMapper,
    ) -> FrameSummary {
        let shapes: Vec<Shape> = contours
            .iter()
            .filter_map(|contour| {
                let corners = detect_corners(contour, &self.config.detector);
                if corners.is_empty() || corners.len() > self.config.max_corners {
                    debug!(corners = corners.len(), "contour gated out");
                    return None;
                }
                Some(Shape::from_corners(
                    corners.iter().map(|c| mapper.map_point(c.point)).collect(),
                ))
            })
            .collect();
        self.process_shapes(&shapes)
    }

    /// One tracking frame over already-detected polygons.
    ///
    /// Lets existing objects claim the observations, classifies and
    /// registers the unclaimed ones against the library, and evicts
    /// objects unobserved for longer than `forget_age`. The whole frame
    /// is planned against a pool snapshot and committed in one critical
    /// section, so readers see either the previous frame or the full new
    /// one, never a half-published state.
    pub fn process_shapes(&self, shapes: &[Shape]) -> FrameSummary {
        let (frame, library, mut claimable) = {
            let state = self.lock();
            let claimable: Vec<(u64, Shape)> = state
                .objects
                .iter()
                .map(|o| (o.id, o.transformed_shape()))
                .collect();
            (state.frame + 1, state.library.clone(), claimable)
        };
        let mut summary = FrameSummary {
            frame,
            observed: shapes.len(),
            ..FrameSummary::default()
        };

        // registration runs outside the lock on the snapshot
        let mut claims: Vec<(u64, Mapping)> = Vec::new();
        let mut creations: Vec<Mapping> = Vec::new();
        for observed in shapes {
            if let Some((id, mapping)) = self.plan_claim(observed, &claimable) {
                claimable.retain(|(cid, _)| *cid != id);
                claims.push((id, mapping));
                summary.matched += 1;
            } else if let Some(mapping) = self.plan_creation(observed, &library) {
                creations.push(mapping);
                summary.created += 1;
            } else {
                debug!(frame, %observed, "observation dropped");
            }
        }

        // end-of-frame commit: counter advance, pose deltas, creations
        // and evictions all publish together
        {
            let mut state = self.lock();
            state.frame = frame;
            for (id, mapping) in claims {
                match state
                    .objects
                    .iter_mut()
                    .find(|o| o.id == id && o.last_active < frame)
                {
                    Some(object) => {
                        object.pose += mapping.pose;
                        object.error = mapping.error;
                        object.last_active = frame;
                        debug!(id, frame, error = mapping.error, "observation matched");
                    }
                    None => {
                        warn!(id, frame, "object claimed concurrently, dropping match");
                        summary.matched -= 1;
                    }
                }
            }
            for mapping in creations {
                let id = state.next_id;
                state.next_id += 1;
                info!(
                    id,
                    frame,
                    template = mapping.model.name(),
                    error = mapping.error,
                    "new object"
                );
                state.objects.push(TrackedObject {
                    id,
                    shape: mapping.model,
                    pose: mapping.pose,
                    scale: mapping.scale,
                    error: mapping.error,
                    mass: 1.0,
                    predicted_pose: None,
                    last_active: frame,
                });
            }
            let before = state.objects.len();
            let forget_age = self.config.forget_age;
            state.objects.retain(|o| frame - o.last_active <= forget_age);
            summary.evicted = before - state.objects.len();
            if summary.evicted > 0 {
                info!(frame, evicted = summary.evicted, "forgot stale objects");
            }
        }

        debug!(
            frame,
            observed = summary.observed,
            matched = summary.matched,
            created = summary.created,
            evicted = summary.evicted,
            "frame processed"
        );
        summary
    }

    /// Match one observation against the still-unclaimed pool snapshot.
    /// Best candidate per object, then the best across objects by mean
    /// corner movement (first index wins ties).
    fn plan_claim(&self, observed: &Shape, claimable: &[(u64, Shape)]) -> Option<(u64, Mapping)> {
        let mut best: Option<(u64, Mapping, f64)> = None;
        for (id, shape) in claimable {
            let mut maps = mapper::map_shape(observed, shape, &self.config.track_map);
            let Some(idx) = mapper::best_mapping(&maps, &self.config.track_map) else {
                continue;
            };
            let candidate = maps.swap_remove(idx);
            let movement = candidate.mean_corner_movement();
            if best.as_ref().map_or(true, |(_, _, d)| movement < *d) {
                best = Some((*id, candidate, movement));
            }
        }
        best.map(|(id, mapping, _)| (id, mapping))
    }

    /// Classify an unclaimed observation and pick the best-registered
    /// library candidate for a new identity.
    fn plan_creation(&self, observed: &Shape, library: &ShapeLibrary) -> Option<Mapping> {
        let candidates = library.classify(observed, &self.config.classify);
        if candidates.is_empty() {
            return None;
        }
        let mut maps = mapper::map_shapes(observed, candidates, &self.config.library_map);
        if maps.is_empty() {
            return None;
        }
        mapper::sort_by_error(&mut maps);
        Some(maps.swap_remove(0))
    }

    /// Objects observed in the most recent frame.
    pub fn active_objects(&self) -> Vec<TrackSnapshot> {
        let state = self.lock();
        state
            .objects
            .iter()
            .filter(|o| o.last_active >= state.frame)
            .map(snapshot)
            .collect()
    }

    /// Every object in the pool, active or not.
    pub fn all_objects(&self) -> Vec<TrackSnapshot> {
        let state = self.lock();
        state.objects.iter().map(snapshot).collect()
    }

    /// Store an externally computed predicted pose for one object.
    pub fn set_predicted_pose(&self, id: u64, pose: RigidPose) -> Result<(), Error> {
        let mut state = self.lock();
        let object = state
            .objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(Error::UnknownObject(id))?;
        object.predicted_pose = Some(pose);
        Ok(())
    }

    /// Store the physical mass of one object for downstream model
    /// building.
    pub fn set_mass(&self, id: u64, mass: f64) -> Result<(), Error> {
        let mut state = self.lock();
        let object = state
            .objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(Error::UnknownObject(id))?;
        object.mass = mass;
        Ok(())
    }

    /// Rescale the template library. Existing poses are anchored to the
    /// old template scale, so the pool is cleared in the same critical
    /// section.
    pub fn set_base_length(&self, base_length: f64) {
        let mut state = self.lock();
        info!(base_length, dropped = state.objects.len(), "library rescaled");
        state.library.set_base_length(base_length);
        state.objects.clear();
    }

    pub fn base_length(&self) -> f64 {
        self.lock().library.base_length()
    }
}

fn snapshot(o: &TrackedObject) -> TrackSnapshot {
    TrackSnapshot {
        id: o.id,
        name: o.shape.name().to_string(),
        pose: o.pose,
        scale: o.scale,
        shape: o.transformed_shape(),
        error: o.error,
        mass: o.mass,
        predicted_pose: o.predicted_pose,
        last_active: o.last_active,
    }
}
