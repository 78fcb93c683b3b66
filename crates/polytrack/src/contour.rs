//! Closed region boundary passed to the corner detector.

/// Ordered, closed sequence of 2D boundary points.
///
/// The points are expected to be "thinned": no redundant doubled pixels
/// along staircase runs (see [`thin_boundary`]). The sequence is treated
/// as a closed loop; open polylines are a caller error and must be
/// rejected upstream.
#[derive(Debug, Clone, Default)]
pub struct Contour {
    points: Vec<[f64; 2]>,
}

impl Contour {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Thin a raw pixel boundary by dropping the redundant doubled pixels
/// of staircase runs, e.g.
///
/// ```text
/// ooox                ooxx
/// ooxo   instead of   oxxo
/// oxoo                xxoo
/// xooo                xooo
/// ```
///
/// Region segmenters usually emit every boundary pixel; the curvature
/// estimate needs the doubled staircase pixels collapsed. Kept points
/// may still be diagonal 8-neighbors of each other, as above.
pub fn thin_boundary(raw: &[[f64; 2]]) -> Contour {
    let n = raw.len();
    if n < 2 {
        return Contour::default();
    }
    let mut thinned = Vec::new();
    let mut cur = raw[n - 1];
    // the loop is closed, so raw[0] succeeds the seed point
    let mut post = raw[0];
    for &p in raw {
        if (p[0] - cur[0]).abs() > 1.0 || (p[1] - cur[1]).abs() > 1.0 {
            // p left the 8-neighborhood of cur: keep cur and jump to the
            // last point that was still inside it
            thinned.push(cur);
            cur = post;
        }
        post = p;
    }
    Contour::new(thinned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thinning_collapses_doubled_staircase() {
        // 4-connected staircase, diffs alternating (1,0)/(0,1): every
        // second pixel is redundant, the kept chain is the diagonal
        let mut raw = Vec::new();
        for i in 0..6 {
            raw.push([i as f64, i as f64]);
            raw.push([i as f64 + 1.0, i as f64]);
        }
        let thinned = thin_boundary(&raw);
        assert!(thinned.len() < raw.len());
        for w in thinned.points().windows(2) {
            assert_ne!(w[0], w[1], "thinned boundary must not repeat a point");
        }
        // the diagonal pixels survive
        for i in 0..5 {
            assert!(thinned.points().contains(&[i as f64, i as f64]));
        }
    }

    #[test]
    fn tiny_input_yields_empty_contour() {
        assert!(thin_boundary(&[[0.0, 0.0]]).is_empty());
        assert!(thin_boundary(&[]).is_empty());
    }
}
