use serde::{Deserialize, Serialize};

use geom::{Angle, Polynomial, Pt2D};

/// Curvatures smaller than this are treated as straight.
const CURVATURE_EPSILON: f64 = 1.0e-12;

/// How far a local position may stray outside a segment before it's considered a bug.
const LOCAL_S_EPSILON: f64 = 1.0e-6;

/// Spirals are integrated piecewise over sub-intervals no longer than this.
const SPIRAL_STEP: f64 = 1.0;

/// How the free parameter of a `paramPoly3` relates to arc length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamRange {
    /// p runs over `[0, length]`
    ArcLength,
    /// p runs over `[0, 1]`
    Normalized,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CurveKind {
    Line,
    Arc {
        curvature: f64,
    },
    /// An Euler spiral; curvature changes linearly along the segment.
    Spiral {
        curv_start: f64,
        curv_end: f64,
    },
    /// `t = f(s)` in the local frame of the segment start.
    Poly3(Polynomial),
    ParamPoly3 {
        u: Polynomial,
        v: Polynomial,
        p_range: ParamRange,
    },
}

/// One piece of a road's reference line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveSegment {
    pub start: Pt2D,
    pub heading: Angle,
    pub length: f64,
    pub kind: CurveKind,
}

impl CurveSegment {
    pub fn line(start: Pt2D, heading: Angle, length: f64) -> CurveSegment {
        CurveSegment {
            start,
            heading,
            length,
            kind: CurveKind::Line,
        }
    }

    /// Straight segments are cheap and exact, so the reference line never caches them.
    pub fn is_straight(&self) -> bool {
        matches!(self.kind, CurveKind::Line)
    }

    /// Position and tangent heading at `local_s` distance from the start of this segment. The
    /// caller must keep `0 <= local_s <= length`.
    pub fn position_and_heading(&self, local_s: f64) -> (Pt2D, Angle) {
        debug_assert!(
            local_s >= -LOCAL_S_EPSILON && local_s <= self.length + LOCAL_S_EPSILON,
            "local_s {} outside of segment with length {}",
            local_s,
            self.length
        );
        let s = local_s.max(0.0).min(self.length);
        let hdg = self.heading.radians();

        match self.kind {
            CurveKind::Line => (self.start.project_away(s, self.heading), self.heading),
            CurveKind::Arc { curvature } => arc(self.start, hdg, curvature, s),
            CurveKind::Spiral {
                curv_start,
                curv_end,
            } => {
                let gamma = (curv_end - curv_start) / self.length;
                if gamma.abs() < CURVATURE_EPSILON {
                    return arc(self.start, hdg, curv_start, s);
                }
                spiral(self.start, hdg, curv_start, gamma, s)
            }
            CurveKind::Poly3(ref poly) => {
                let t = poly.eval(s);
                let (sin, cos) = hdg.sin_cos();
                let pt = self.start.offset(s * cos - t * sin, s * sin + t * cos);
                (pt, Angle::new(hdg + poly.derivative(s)))
            }
            CurveKind::ParamPoly3 {
                ref u,
                ref v,
                p_range,
            } => {
                let p = match p_range {
                    ParamRange::ArcLength => s,
                    ParamRange::Normalized => s / self.length,
                };
                let (x, y) = (u.eval(p), v.eval(p));
                let (sin, cos) = hdg.sin_cos();
                let pt = self.start.offset(x * cos - y * sin, x * sin + y * cos);
                let tangent = v.derivative(p).atan2(u.derivative(p));
                (pt, Angle::new(hdg + tangent))
            }
        }
    }

    pub fn end(&self) -> (Pt2D, Angle) {
        self.position_and_heading(self.length)
    }
}

fn arc(start: Pt2D, hdg: f64, curvature: f64, s: f64) -> (Pt2D, Angle) {
    if curvature.abs() < CURVATURE_EPSILON {
        return (start.project_away(s, Angle::new(hdg)), Angle::new(hdg));
    }
    let end_hdg = hdg + curvature * s;
    let dx = (end_hdg.sin() - hdg.sin()) / curvature;
    let dy = -(end_hdg.cos() - hdg.cos()) / curvature;
    (start.offset(dx, dy), Angle::new(end_hdg))
}

// Gauss-Legendre nodes and weights on [-1, 1]
const GL5_NODES: [f64; 5] = [
    0.0,
    -0.538_469_310_105_683_1,
    0.538_469_310_105_683_1,
    -0.906_179_845_938_664,
    0.906_179_845_938_664,
];
const GL5_WEIGHTS: [f64; 5] = [
    0.568_888_888_888_888_9,
    0.478_628_670_499_366_5,
    0.478_628_670_499_366_5,
    0.236_926_885_056_189_1,
    0.236_926_885_056_189_1,
];

/// Integrates the unit tangent of a clothoid with heading `hdg + k0*u + gamma*u^2/2` from 0 to
/// `s`.
fn spiral(start: Pt2D, hdg: f64, k0: f64, gamma: f64, s: f64) -> (Pt2D, Angle) {
    let theta = |u: f64| hdg + k0 * u + 0.5 * gamma * u * u;
    if s == 0.0 {
        return (start, Angle::new(hdg));
    }

    let pieces = (s / SPIRAL_STEP).ceil().max(1.0) as usize;
    let step = s / (pieces as f64);
    let mut dx = 0.0;
    let mut dy = 0.0;
    for i in 0..pieces {
        let a = (i as f64) * step;
        let mid = a + 0.5 * step;
        let half = 0.5 * step;
        for (node, weight) in GL5_NODES.iter().zip(GL5_WEIGHTS.iter()) {
            let (sin, cos) = theta(mid + half * node).sin_cos();
            dx += weight * half * cos;
            dy += weight * half * sin;
        }
    }
    (start.offset(dx, dy), Angle::new(theta(s)))
}
