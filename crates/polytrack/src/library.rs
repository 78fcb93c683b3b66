//! Shape template library and corner-count classifier.
//!
//! The library holds the polygon templates that detected shapes are
//! matched against. It can be populated with the built-in tangram set or
//! loaded from a JSON document (schema [`SHAPE_SCHEMA`]).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::shape::Shape;

/// Schema tag expected in shape library JSON documents.
pub const SHAPE_SCHEMA: &str = "polytrack.shapes.v1";

/// Classifier settings.
#[derive(Debug, Clone)]
pub struct ClassifyConfig {
    /// Relative area tolerance: a template is a candidate only when
    /// `|template_area - observed_area| < template_area * tolerance`.
    /// `None` disables the area check and matches on corner count alone.
    pub area_tolerance: Option<f64>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            area_tolerance: Some(0.2),
        }
    }
}

/// On-disk shape library document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LibraryDoc {
    schema: String,
    /// Reference edge length; template corners are given in units of it.
    base_length: f64,
    /// Extrusion height for all shapes. Defaults to `base_length / 7`.
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<f64>,
    shapes: Vec<ShapeEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ShapeEntry {
    name: String,
    /// Flat x,y corner list in corner-scaling units.
    corners: Vec<f64>,
    /// Extra per-shape scale applied on top of `base_length`.
    #[serde(default = "default_corner_scaling")]
    corner_scaling: f64,
}

fn default_corner_scaling() -> f64 {
    1.0
}

/// Polygon template library.
///
/// All templates share one `base_length`; rescaling the library rescales
/// every template in place so that classification and registration always
/// see a consistent set.
#[derive(Debug, Clone, Default)]
pub struct ShapeLibrary {
    templates: Vec<Shape>,
    base_length: f64,
    height: f64,
}

impl ShapeLibrary {
    /// The seven-piece tangram set: three triangle sizes, a square and a
    /// parallelogram, all with unit-area proportions scaled by
    /// `base_length`. A negative or missing height defaults to
    /// `base_length / 7`.
    pub fn standard_tangram(base_length: f64, height: Option<f64>) -> Self {
        let height = height.unwrap_or(base_length / 7.0);
        let s2 = std::f64::consts::SQRT_2;

        let triangle = |name: &str, scale: f64| {
            let corners = [[-s2 / 2.0, -s2 / 6.0], [0.0, s2 / 3.0], [s2 / 2.0, -s2 / 6.0]]
                .iter()
                .map(|p| [p[0] * scale, p[1] * scale])
                .collect();
            Shape::with_corners(name, height, corners)
        };

        let mut parallelogram = Shape::with_corners(
            "Parallelogram",
            height,
            vec![
                [-0.75 * s2, -0.25 * s2],
                [-0.25 * s2, 0.25 * s2],
                [0.75 * s2, 0.25 * s2],
                [0.25 * s2, -0.25 * s2],
            ],
        );
        parallelogram.scale(base_length, false);

        let mut square = Shape::with_corners(
            "Square",
            height,
            vec![[-0.5, -0.5], [0.5, -0.5], [0.5, 0.5], [-0.5, 0.5]],
        );
        square.scale(base_length, false);

        Self {
            templates: vec![
                triangle("Triangle Small", base_length),
                triangle("Triangle Medium", s2 * base_length),
                triangle("Triangle Large", 2.0 * base_length),
                parallelogram,
                square,
            ],
            base_length,
            height,
        }
    }

    /// Load a library from a JSON document string.
    pub fn from_json_str(data: &str) -> Result<Self, Error> {
        let doc: LibraryDoc = serde_json::from_str(data)?;
        if doc.schema != SHAPE_SCHEMA {
            return Err(Error::Schema {
                expected: SHAPE_SCHEMA,
                found: doc.schema,
            });
        }
        let height = doc.height.unwrap_or(doc.base_length / 7.0);
        let mut templates = Vec::with_capacity(doc.shapes.len());
        for entry in doc.shapes {
            if entry.corners.len() % 2 != 0 {
                return Err(Error::OddCornerList { name: entry.name });
            }
            let s = entry.corner_scaling * doc.base_length;
            let corners = entry
                .corners
                .chunks_exact(2)
                .map(|c| [c[0] * s, c[1] * s])
                .collect();
            templates.push(Shape::with_corners(entry.name, height, corners));
        }
        Ok(Self {
            templates,
            base_length: doc.base_length,
            height,
        })
    }

    /// Load a library from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn templates(&self) -> &[Shape] {
        &self.templates
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn base_length(&self) -> f64 {
        self.base_length
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Rescale every template to a new base length (around each template's
    /// own centroid). Heights are unaffected.
    pub fn set_base_length(&mut self, base_length: f64) {
        if self.base_length == base_length || self.base_length == 0.0 {
            self.base_length = base_length;
            return;
        }
        let ratio = base_length / self.base_length;
        for t in &mut self.templates {
            t.scale(ratio, false);
        }
        self.base_length = base_length;
    }

    /// Set the extrusion height on every template.
    pub fn set_height(&mut self, height: f64) {
        for t in &mut self.templates {
            t.set_height(height);
        }
        self.height = height;
    }

    /// Templates compatible with an observed shape.
    ///
    /// A template qualifies when its corner count is within
    /// `[observed - 2, observed]` (corner detection merges corners far
    /// more often than it invents them) and, if enabled, its area is
    /// within the relative tolerance of the observed area.
    pub fn classify(&self, observed: &Shape, cfg: &ClassifyConfig) -> Vec<&Shape> {
        let data_corners = observed.corner_count();
        self.templates
            .iter()
            .filter(|t| {
                let mc = t.corner_count();
                if mc > data_corners || mc + 2 < data_corners {
                    return false;
                }
                match cfg.area_tolerance {
                    Some(tol) => (t.area() - observed.area()).abs() < t.area() * tol,
                    None => true,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn standard_tangram_proportions() {
        let lib = ShapeLibrary::standard_tangram(70.0, None);
        assert_eq!(lib.templates().len(), 5);
        assert_relative_eq!(lib.height(), 10.0);

        let area = |name: &str| {
            lib.templates()
                .iter()
                .find(|s| s.name() == name)
                .unwrap()
                .area()
        };
        // tangram area ratios: medium triangle, square and parallelogram
        // are each twice the small triangle; the large one four times
        let small = area("Triangle Small");
        assert_relative_eq!(area("Triangle Medium"), 2.0 * small, epsilon = 1e-9);
        assert_relative_eq!(area("Triangle Large"), 4.0 * small, epsilon = 1e-9);
        assert_relative_eq!(area("Square"), 2.0 * small, epsilon = 1e-9);
        assert_relative_eq!(area("Parallelogram"), 2.0 * small, epsilon = 1e-9);
    }

    #[test]
    fn rescale_keeps_proportions() {
        let mut lib = ShapeLibrary::standard_tangram(50.0, None);
        let before = lib.templates()[4].area();
        lib.set_base_length(100.0);
        assert_relative_eq!(lib.base_length(), 100.0);
        assert_relative_eq!(lib.templates()[4].area(), 4.0 * before, epsilon = 1e-9);
    }

    #[test]
    fn classify_by_corner_count() {
        let lib = ShapeLibrary::standard_tangram(10.0, None);
        let triangle = Shape::from_corners(vec![[0.0, 0.0], [8.0, 0.0], [0.0, 8.0]]);
        let cfg = ClassifyConfig {
            area_tolerance: None,
        };
        let candidates = lib.classify(&triangle, &cfg);
        // triangles only: quadrilateral templates have too many corners
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|s| s.name().starts_with("Triangle")));

        // a pentagon-ish detection still admits the quadrilaterals
        let penta = Shape::from_corners(vec![
            [0.0, 0.0],
            [4.0, 0.0],
            [5.0, 3.0],
            [2.0, 5.0],
            [-1.0, 3.0],
        ]);
        let candidates = lib.classify(&penta, &cfg);
        assert_eq!(candidates.len(), 5);
    }

    #[test]
    fn classify_with_area_tolerance() {
        let lib = ShapeLibrary::standard_tangram(10.0, None);
        let square = lib
            .templates()
            .iter()
            .find(|s| s.name() == "Square")
            .unwrap();
        let mut observed = square.clone();
        observed.set_name("");
        let cfg = ClassifyConfig {
            area_tolerance: Some(0.1),
        };
        let names: Vec<_> = lib
            .classify(&observed, &cfg)
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert!(names.contains(&"Square".to_string()));
        assert!(!names.contains(&"Triangle Small".to_string()));
    }

    #[test]
    fn json_round_trip_and_schema_check() {
        let doc = r#"{
            "schema": "polytrack.shapes.v1",
            "base_length": 10.0,
            "shapes": [
                { "name": "Square", "corners": [-0.5, -0.5, 0.5, -0.5, 0.5, 0.5, -0.5, 0.5] },
                { "name": "Big Square", "corners": [-0.5, -0.5, 0.5, -0.5, 0.5, 0.5, -0.5, 0.5],
                  "corner_scaling": 2.0 }
            ]
        }"#;
        let lib = ShapeLibrary::from_json_str(doc).unwrap();
        assert_eq!(lib.templates().len(), 2);
        assert_relative_eq!(lib.height(), 10.0 / 7.0, epsilon = 1e-12);
        assert_relative_eq!(lib.templates()[0].area(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(lib.templates()[1].area(), 400.0, epsilon = 1e-9);

        let bad = doc.replace("polytrack.shapes.v1", "polytrack.shapes.v9");
        match ShapeLibrary::from_json_str(&bad) {
            Err(Error::Schema { found, .. }) => assert_eq!(found, "polytrack.shapes.v9"),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn odd_corner_list_is_rejected() {
        let doc = r#"{
            "schema": "polytrack.shapes.v1",
            "base_length": 1.0,
            "shapes": [ { "name": "broken", "corners": [0.0, 0.0, 1.0] } ]
        }"#;
        match ShapeLibrary::from_json_str(doc) {
            Err(Error::OddCornerList { name }) => assert_eq!(name, "broken"),
            other => panic!("expected odd corner list error, got {other:?}"),
        }
    }
}
