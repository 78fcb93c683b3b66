//! Curvature-based corner detection on closed contours.
//!
//! Implementation of the curvature scale space corner detector described
//! in "Corner detector based on global and local curvature properties"
//! (He & Yung, Optical Engineering 2008). The contour coordinates are
//! smoothed with a 1D Gaussian, the curvature function is computed, and
//! its local maxima are taken as corner candidates. Candidates that belong
//! to round corners or to noise-induced "false" corners are then removed.
//!
//! The numeric defaults below were tuned against a specific camera and
//! lighting setup; treat them as calibration data and re-validate before
//! reusing them elsewhere.

use crate::contour::Contour;
use crate::pose::normalize_angle;

/// Kernel tail amplitude below which the Gaussian is truncated.
const GAUSSIAN_DIE_OFF: f64 = 1e-4;

/// Contours shorter than this cannot support the smoothing kernel and the
/// curvature estimate; the detector returns an empty result for them.
const MIN_CONTOUR_POINTS: usize = 5;

/// Parameters of the curvature scale space detector.
#[derive(Debug, Clone)]
pub struct CssConfig {
    /// Standard deviation of the Gaussian used to smooth the contour.
    pub sigma: f64,
    /// Upper clamp on the curvature magnitude; suppresses single-pixel
    /// curvature spikes.
    pub curvature_cutoff: f64,
    /// Round-corner coefficient: minimum ratio of a candidate's curvature
    /// to the mean curvature over its region of support. Equivalent to the
    /// minimum major/minor axis ratio of an ellipse whose vertex still
    /// counts as a corner.
    pub rc_coeff: f64,
    /// Maximum obtuse opening angle (degrees) a true corner can have.
    pub max_angle: f64,
    /// Blend threshold (degrees) between straight-line and circle-fit
    /// tangent estimation: the straight-line approximation is used when
    /// the segment midpoint deviates from the chord by less than this.
    /// 0 means circle fit only, 180 straight lines only.
    pub straight_line_thresh: f64,
}

impl Default for CssConfig {
    fn default() -> Self {
        Self {
            sigma: 3.0,
            curvature_cutoff: 100.0,
            rc_coeff: 1.5,
            max_angle: 162.0,
            straight_line_thresh: 0.1,
        }
    }
}

/// A detected corner: original contour position plus the estimated
/// opening angle in degrees.
#[derive(Debug, Clone, Copy)]
pub struct Corner {
    pub point: [f64; 2],
    pub angle: f64,
}

/// Detect corners on a closed, thinned contour.
///
/// Deterministic for identical input and parameters. Contours too short
/// for the smoothing kernel yield an empty list, never a partial result.
pub fn detect_corners(contour: &Contour, cfg: &CssConfig) -> Vec<Corner> {
    let pts = contour.points();
    let n = pts.len();
    let kernel = gaussian_kernel(cfg.sigma);
    if n < MIN_CONTOUR_POINTS || n < kernel.len() {
        return Vec::new();
    }

    let xs: Vec<f64> = pts.iter().map(|p| p[0]).collect();
    let ys: Vec<f64> = pts.iter().map(|p| p[1]).collect();
    let sx = convolve_circular(&xs, &kernel);
    let sy = convolve_circular(&ys, &kernel);

    let k = curvature(&sx, &sy, cfg.curvature_cutoff);

    // corner candidates: local maxima of the curvature magnitude
    let candidates = local_maxima(&k);

    // adaptive local threshold removes round corners
    let mut surviving: Vec<usize> = candidates
        .into_iter()
        .filter(|&i| passes_round_corner_check(&k, i, cfg.rc_coeff))
        .collect();

    // remove false corners by their opening angle; removing one candidate
    // changes the neighbors of the rest, so iterate until stable
    let mut angles: Vec<f64> = Vec::new();
    loop {
        if surviving.is_empty() {
            break;
        }
        let m = surviving.len();
        let mut keep = vec![true; m];
        angles.clear();
        let mut removed = false;
        for j in 0..m {
            let prev = surviving[(j + m - 1) % m];
            let next = surviving[(j + 1) % m];
            let (segment, center) = circular_segment(&sx, &sy, prev, surviving[j], next);
            let angle = corner_angle(&segment, center, cfg.straight_line_thresh);
            angles.push(angle);
            if angle > cfg.max_angle {
                keep[j] = false;
                removed = true;
            }
        }
        if !removed {
            break;
        }
        surviving = surviving
            .into_iter()
            .zip(keep)
            .filter_map(|(idx, k)| k.then_some(idx))
            .collect();
    }

    // map surviving indices back to the unsmoothed contour
    surviving
        .iter()
        .zip(&angles)
        .map(|(&idx, &angle)| Corner {
            point: pts[idx],
            angle,
        })
        .collect()
}

/// Normalized 1D Gaussian, truncated where the amplitude drops below
/// [`GAUSSIAN_DIE_OFF`]. Length is always odd.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let ssq = sigma * sigma;
    let mut width = 0i64;
    while (-(((width + 1) * (width + 1)) as f64) / (2.0 * ssq)).exp() > GAUSSIAN_DIE_OFF {
        width += 1;
    }
    let mut kernel: Vec<f64> = (-width..=width)
        .map(|t| (-((t * t) as f64) / (2.0 * ssq)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Circular convolution; output has the same length and phase as the input.
fn convolve_circular(vals: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = vals.len() as i64;
    let half = (kernel.len() / 2) as i64;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(j, &g)| {
                    let idx = (i + j as i64 - half).rem_euclid(n) as usize;
                    g * vals[idx]
                })
                .sum()
        })
        .collect()
}

/// Curvature magnitude of the smoothed contour, clamped at `cutoff`.
///
/// kappa = (x'y'' - x''y') / (x'^2 + y'^2)^1.5 with circular central
/// differences.
fn curvature(sx: &[f64], sy: &[f64], cutoff: f64) -> Vec<f64> {
    let n = sx.len();
    (0..n)
        .map(|i| {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            let xd = (sx[next] - sx[prev]) / 2.0;
            let yd = (sy[next] - sy[prev]) / 2.0;
            let xdd = sx[next] - 2.0 * sx[i] + sx[prev];
            let ydd = sy[next] - 2.0 * sy[i] + sy[prev];
            let denom = (xd * xd + yd * yd).powf(1.5);
            if denom < f64::EPSILON {
                0.0
            } else {
                ((xd * ydd - xdd * yd) / denom).abs().min(cutoff)
            }
        })
        .collect()
}

/// Indices of local maxima on the circular curvature function.
fn local_maxima(k: &[f64]) -> Vec<usize> {
    let n = k.len();
    (0..n)
        .filter(|&i| {
            let prev = k[(i + n - 1) % n];
            let next = k[(i + 1) % n];
            k[i] > prev && k[i] >= next
        })
        .collect()
}

/// Walk from a maximum towards falling curvature until the nearest local
/// minimum; `step` is +1 or -1 (circular).
fn nearest_minimum(k: &[f64], start: usize, step: i64) -> usize {
    let n = k.len() as i64;
    let mut j = start as i64;
    for _ in 0..n {
        let p = (j + step).rem_euclid(n);
        if k[p as usize] <= k[j as usize] && p != start as i64 {
            j = p;
        } else {
            break;
        }
    }
    j as usize
}

/// Round-corner check: the candidate's curvature must exceed `rc_coeff`
/// times the mean curvature over its region of support (the span between
/// the two neighboring curvature minima).
fn passes_round_corner_check(k: &[f64], i: usize, rc_coeff: f64) -> bool {
    let n = k.len();
    let left = nearest_minimum(k, i, -1);
    let right = nearest_minimum(k, i, 1);
    let span = (right + n - left) % n;
    let count = span + 1;
    let sum: f64 = (0..count).map(|t| k[(left + t) % n]).sum();
    let mean = sum / count as f64;
    k[i] >= rc_coeff * mean
}

/// Extract the contour segment from `start` through `center` to `end`
/// (circular, forward direction). Returns the segment points and the
/// position of `center` within them. With a single surviving candidate
/// (`start == center == end`) the segment covers the whole loop, split
/// evenly around the candidate.
fn circular_segment(
    sx: &[f64],
    sy: &[f64],
    start: usize,
    center: usize,
    end: usize,
) -> (Vec<[f64; 2]>, usize) {
    let n = sx.len();
    let mut before = (center + n - start) % n;
    let mut after = (end + n - center) % n;
    if before == 0 && after == 0 {
        before = n / 2;
        after = n - 1 - before;
    }
    let first = (center + n - before) % n;
    let len = before + after + 1;
    let segment = (0..len)
        .map(|t| {
            let idx = (first + t) % n;
            [sx[idx], sy[idx]]
        })
        .collect();
    (segment, before)
}

/// Opening angle (degrees, in [0, 180]) at `center` between the tangents
/// of the two adjoining contour sides.
fn corner_angle(segment: &[[f64; 2]], center: usize, straight_line_thresh: f64) -> f64 {
    let left: Vec<[f64; 2]> = segment[..=center].iter().rev().copied().collect();
    let right: Vec<[f64; 2]> = segment[center..].to_vec();
    let d1 = side_tangent(&left, straight_line_thresh);
    let d2 = side_tangent(&right, straight_line_thresh);
    let mut angle = (d1 - d2).abs().to_degrees();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    angle
}

/// Tangent direction (radians) of one side of a corner candidate; the
/// side runs from the candidate (`curve[0]`) outwards.
///
/// Long sides are either circle-fitted (three-point circumcircle, tangent
/// at the candidate) or chord-approximated when nearly straight; very
/// short sides always use the chord.
fn side_tangent(curve: &[[f64; 2]], straight_line_thresh: f64) -> f64 {
    let l = curve.len();
    if l < 2 {
        return 0.0;
    }
    let chord_dir = |a: [f64; 2], b: [f64; 2]| (b[1] - a[1]).atan2(b[0] - a[0]);
    let first = curve[0];
    let last = curve[l - 1];
    if l <= 3 {
        return chord_dir(first, last);
    }

    let (p1, p2, p3) = if first != last {
        (first, curve[l.div_ceil(2) - 1], last)
    } else {
        // closed side: pick two interior support points instead
        (first, curve[l.div_ceil(3) - 1], curve[(2 * l).div_ceil(3) - 1])
    };

    let cross = (p1[0] - p2[0]) * (p1[1] - p3[1]) - (p1[0] - p3[0]) * (p1[1] - p2[1]);
    let deviation = normalize_angle(chord_dir(p1, p2) - chord_dir(p1, p3))
        .abs()
        .to_degrees();
    if cross.abs() < 1e-8 || deviation < straight_line_thresh {
        return chord_dir(first, last);
    }

    // circumcircle through the three support points; tangent at p1 is
    // perpendicular to the radius, oriented towards the curve
    let d = 2.0
        * (p1[0] * (p2[1] - p3[1]) + p2[0] * (p3[1] - p1[1]) + p3[0] * (p1[1] - p2[1]));
    if d.abs() < 1e-12 {
        return chord_dir(first, last);
    }
    let sq = |p: [f64; 2]| p[0] * p[0] + p[1] * p[1];
    let ux = (sq(p1) * (p2[1] - p3[1]) + sq(p2) * (p3[1] - p1[1]) + sq(p3) * (p1[1] - p2[1])) / d;
    let uy = (sq(p1) * (p3[0] - p2[0]) + sq(p2) * (p1[0] - p3[0]) + sq(p3) * (p2[0] - p1[0])) / d;
    let radius_dir = (uy - p1[1]).atan2(ux - p1[0]);
    let adjacent_dir = chord_dir(p1, p2);
    (adjacent_dir - radius_dir).sin().signum() * std::f64::consts::FRAC_PI_2 + radius_dir
}
