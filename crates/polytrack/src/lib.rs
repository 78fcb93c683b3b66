//! polytrack — polygon detection and identity tracking for tabletop vision.
//!
//! Detects polygonal objects (e.g. tangram pieces) from closed image
//! contours and tracks them across frames. The pipeline stages are:
//!
//! 1. **Contour** – thinning of raw pixel boundaries into sparse loops.
//! 2. **Corner** – curvature scale space corner detection on the loop.
//! 3. **Library** – corner-count/area pre-filter against polygon templates.
//! 4. **Mapper** – rigid registration of a template onto the observation,
//!    every target corner tried as the alignment anchor.
//! 5. **Track** – identity pool with additive pose integration and
//!    forgetting, shared between the detection loop and reader threads.
//! 6. **Predict** – pluggable pose extrapolation written back into the
//!    pool for downstream consumers.

pub mod contour;
pub mod corner;
pub mod error;
pub mod library;
pub mod mapper;
pub mod params;
pub mod pose;
pub mod predict;
pub mod shape;
pub mod track;

pub use contour::{thin_boundary, Contour};
pub use corner::{detect_corners, Corner, CssConfig};
pub use error::Error;
pub use library::{ClassifyConfig, ShapeLibrary, SHAPE_SCHEMA};
pub use mapper::{best_mapping, map_shape, map_shapes, sort_by_error, MapConfig, Mapping};
pub use params::SimParams;
pub use pose::{normalize_angle, RigidPose};
pub use predict::{apply_predictions, DriftSimulator, HoldSimulator, PoseEntry, PoseSimulator};
pub use shape::{Aabb, Shape};
pub use track::{
    CornerMapper, FrameSummary, IdentityMapper, TrackSnapshot, Tracker, TrackerConfig,
};
