use serde::{Deserialize, Serialize};

use geom::{Angle, Pt2D};

use crate::{CurveSegment, Error, Result};

/// Positions past either end of the reference line by less than this are clamped.
pub const RANGE_TOLERANCE: f64 = 1.0e-3;

/// Consecutive segments whose endpoints are further apart than this are reported.
pub const CONTIGUITY_TOLERANCE: f64 = 1.0e-2;

/// A road's reference line: its curve segments laid end-to-end, addressed by arc length.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceLine {
    road: i64,
    segments: Vec<CurveSegment>,
    /// `geo_lengths[i]` is where segment `i` begins; the last entry is the total length.
    geo_lengths: Vec<f64>,
    /// Parallel to `segments`. Straight segments never have one.
    cache: Vec<Option<SegmentCache>>,
}

/// Evenly spaced samples of one curved segment, from its start to its end inclusive.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SegmentCache {
    step: f64,
    samples: Vec<(Pt2D, Angle)>,
}

impl ReferenceLine {
    /// Segments of zero length carry no geometry and are dropped.
    pub fn new(road: i64, segments: Vec<CurveSegment>) -> Result<ReferenceLine> {
        let segments: Vec<CurveSegment> =
            segments.into_iter().filter(|s| s.length > 0.0).collect();
        if segments.is_empty() {
            return Err(Error::document(
                format!("road[id={}]/planView", road),
                "no geometry with a positive length",
            ));
        }
        let mut geo_lengths = vec![0.0];
        for seg in &segments {
            geo_lengths.push(geo_lengths.last().unwrap() + seg.length);
        }
        let cache = vec![None; segments.len()];
        Ok(ReferenceLine {
            road,
            segments,
            geo_lengths,
            cache,
        })
    }

    pub fn length(&self) -> f64 {
        *self.geo_lengths.last().unwrap()
    }

    pub fn segments(&self) -> &[CurveSegment] {
        &self.segments
    }

    /// Pairs of (index of the later segment, gap in meters) wherever one segment doesn't begin
    /// where the previous one ended.
    pub fn contiguity_gaps(&self) -> Vec<(usize, f64)> {
        let mut gaps = Vec::new();
        for (idx, pair) in self.segments.windows(2).enumerate() {
            let gap = pair[0].end().0.dist_to(pair[1].start);
            if gap > CONTIGUITY_TOLERANCE {
                gaps.push((idx + 1, gap));
            }
        }
        gaps
    }

    /// Samples every curved segment at roughly `step` spacing. Later calls to `evaluate`
    /// interpolate between these samples.
    pub fn precalculate(&mut self, step: f64) {
        for (seg, cache) in self.segments.iter().zip(self.cache.iter_mut()) {
            if seg.is_straight() {
                continue;
            }
            let num_steps = ((seg.length / step).ceil() as usize).max(2);
            let actual_step = seg.length / ((num_steps - 1) as f64);
            let samples = (0..num_steps)
                .map(|i| {
                    let local_s = if i == num_steps - 1 {
                        seg.length
                    } else {
                        (i as f64) * actual_step
                    };
                    seg.position_and_heading(local_s)
                })
                .collect();
            *cache = Some(SegmentCache {
                step: actual_step,
                samples,
            });
        }
    }

    /// Position and heading at arc length `s`, using the cache when there is one.
    pub fn evaluate(&self, s: f64) -> Result<(Pt2D, Angle)> {
        let (idx, local_s) = self.locate(s)?;
        if let Some(ref cache) = self.cache[idx] {
            return Ok(cache.interpolate(local_s));
        }
        Ok(self.segments[idx].position_and_heading(local_s))
    }

    /// Finds the segment containing `s` and the position within it.
    fn locate(&self, s: f64) -> Result<(usize, f64)> {
        let length = self.length();
        if s < -RANGE_TOLERANCE || s > length + RANGE_TOLERANCE || s.is_nan() {
            return Err(Error::GeometryRange {
                road: self.road,
                s,
                length,
            });
        }
        let s = s.max(0.0).min(length);
        let idx = self.geo_lengths[..self.segments.len()]
            .partition_point(|start| *start <= s)
            .saturating_sub(1);
        let local_s = (s - self.geo_lengths[idx]).min(self.segments[idx].length);
        Ok((idx, local_s))
    }
}

impl SegmentCache {
    fn interpolate(&self, local_s: f64) -> (Pt2D, Angle) {
        let last = self.samples.len() - 1;
        let raw = local_s / self.step;
        let idx = (raw.floor() as usize).min(last - 1);
        let pct = (raw - idx as f64).max(0.0).min(1.0);
        let (pt1, hdg1) = self.samples[idx];
        let (pt2, hdg2) = self.samples[idx + 1];
        let pt = Pt2D::new(
            pt1.x() + (pt2.x() - pt1.x()) * pct,
            pt1.y() + (pt2.y() - pt1.y()) * pct,
        );
        (pt, hdg1.lerp(hdg2, pct))
    }
}
