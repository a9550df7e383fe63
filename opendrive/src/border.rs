use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use geom::{Angle, Polynomial, Pt2D};

use crate::raw::PolyRecord;
use crate::{Error, ReferenceLine, Result};

/// Resolving a border may hop through at most this many other borders before reaching the
/// reference line.
pub const MAX_BORDER_HOPS: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BorderId(pub usize);

/// What a border's offset is measured from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorderReference {
    ReferenceLine,
    Border(BorderId),
}

/// A lateral offset function, piecewise cubic in `s`, stacked on top of another border or the
/// reference line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Border {
    pub reference: BorderReference,
    /// Added to `s` before evaluating the reference. Borders measured within a lane section use
    /// this to reach road-level positions.
    pub ref_offset: f64,
    /// Sorted ascending. `width_coefficients[i]` applies from `width_coefficient_offsets[i]`.
    pub width_coefficient_offsets: Vec<f64>,
    pub width_coefficients: Vec<Polynomial>,
}

impl Border {
    pub fn new(reference: BorderReference, ref_offset: f64) -> Border {
        Border {
            reference,
            ref_offset,
            width_coefficient_offsets: Vec::new(),
            width_coefficients: Vec::new(),
        }
    }

    pub fn push(&mut self, offset: f64, poly: Polynomial) {
        self.width_coefficient_offsets.push(offset);
        self.width_coefficients.push(poly);
    }

    /// The base border of a road: the reference line shifted by the lane offset records. With no
    /// records, it's the reference line itself.
    pub fn reference_border(lane_offsets: &[PolyRecord]) -> Border {
        let mut border = Border::new(BorderReference::ReferenceLine, 0.0);
        for record in lane_offsets {
            // A later record at the same s replaces the earlier one
            if let Some(idx) = border
                .width_coefficient_offsets
                .iter()
                .position(|s| *s == record.s)
            {
                border.width_coefficient_offsets.remove(idx);
                border.width_coefficients.remove(idx);
            }
            border.push(record.s, record.poly);
        }
        if border.width_coefficients.is_empty() {
            border.push(0.0, Polynomial::ZERO);
        }
        border
    }

    /// This border's own contribution at `s`, not including whatever it references.
    ///
    /// When `closing` is set, `s` is the end of some segment being sampled, so a polynomial
    /// starting exactly at `s` doesn't apply yet; the previous one is evaluated at its end
    /// instead. Authored discontinuities come out exactly as written.
    pub fn width_at(&self, s: f64, closing: bool) -> f64 {
        if self.width_coefficients.is_empty() {
            return 0.0;
        }
        let count = if closing {
            self.width_coefficient_offsets.partition_point(|x| *x < s)
        } else {
            self.width_coefficient_offsets.partition_point(|x| *x <= s)
        };
        // Positions before the first record use the first record
        let idx = count.saturating_sub(1);
        self.width_coefficients[idx].eval(s - self.width_coefficient_offsets[idx])
    }
}

/// A point on a border.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BorderPoint {
    pub pos: Pt2D,
    /// Tangent of the reference line at `ref_s`
    pub heading: Angle,
    /// Total lateral offset from the reference line, positive to the left
    pub t: f64,
    /// Where along the reference line this point was projected from
    pub ref_s: f64,
}

/// Every border of one road. Borders refer to each other by `BorderId`, an index into this.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Borders {
    road: i64,
    borders: Vec<Border>,
}

impl Borders {
    pub fn new(road: i64) -> Borders {
        Borders {
            road,
            borders: Vec::new(),
        }
    }

    pub fn add(&mut self, border: Border) -> BorderId {
        self.borders.push(border);
        BorderId(self.borders.len() - 1)
    }

    pub fn get(&self, id: BorderId) -> &Border {
        &self.borders[id.0]
    }

    pub fn len(&self) -> usize {
        self.borders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.borders.is_empty()
    }

    /// Follows the chain of references from `id` down to the reference line, summing every
    /// border's contribution. Returns the total lateral offset and the position along the
    /// reference line where it applies.
    pub fn offset(&self, id: BorderId, s: f64, closing: bool) -> Result<(f64, f64)> {
        let mut t = 0.0;
        let mut s = s;
        let mut current = id;
        let mut hops = 0;
        loop {
            let border = &self.borders[current.0];
            t += border.width_at(s, closing);
            s += border.ref_offset;
            match border.reference {
                BorderReference::ReferenceLine => {
                    return Ok((t, s));
                }
                BorderReference::Border(next) => {
                    hops += 1;
                    if hops > MAX_BORDER_HOPS {
                        return Err(Error::CyclicBorder {
                            road: self.road,
                            hops,
                        });
                    }
                    current = next;
                }
            }
        }
    }

    /// The position of border `id` at `s`, measured in that border's own coordinates.
    pub fn calc(
        &self,
        line: &ReferenceLine,
        id: BorderId,
        s: f64,
        closing: bool,
    ) -> Result<BorderPoint> {
        let (t, ref_s) = self.offset(id, s, closing)?;
        let (ref_pt, heading) = line.evaluate(ref_s)?;
        Ok(BorderPoint {
            pos: ref_pt.project_away(t, heading.rotate_rads(FRAC_PI_2)),
            heading,
            t,
            ref_s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CurveSegment;

    fn straight(length: f64) -> ReferenceLine {
        ReferenceLine::new(1, vec![CurveSegment::line(Pt2D::zero(), Angle::ZERO, length)]).unwrap()
    }

    #[test]
    fn chained_offsets_accumulate() {
        let mut borders = Borders::new(1);
        let reference = borders.add(Border::reference_border(&[PolyRecord {
            s: 0.0,
            poly: Polynomial::constant(1.0),
        }]));
        let mut first = Border::new(BorderReference::Border(reference), 10.0);
        first.push(0.0, Polynomial::constant(3.0));
        let first = borders.add(first);
        let mut second = Border::new(BorderReference::Border(first), 0.0);
        second.push(0.0, Polynomial::new(2.0, 0.1, 0.0, 0.0));
        let second = borders.add(second);

        let (t, ref_s) = borders.offset(second, 5.0, false).unwrap();
        assert!((t - (1.0 + 3.0 + 2.5)).abs() < 1e-12);
        assert_eq!(ref_s, 15.0);

        let pt = borders.calc(&straight(20.0), second, 5.0, false).unwrap();
        assert!(pt.pos.approx_eq(Pt2D::new(15.0, 6.5)));
    }

    #[test]
    fn discontinuity_is_kept() {
        let mut border = Border::new(BorderReference::ReferenceLine, 0.0);
        border.push(0.0, Polynomial::new(3.0, 0.1, 0.0, 0.0));
        border.push(5.0, Polynomial::constant(4.0));
        assert_eq!(border.width_at(5.0, true), 3.5);
        assert_eq!(border.width_at(5.0, false), 4.0);
        assert_eq!(border.width_at(0.0, true), 3.0);
        assert_eq!(border.width_at(7.0, true), 4.0);

        let mut continuous = Border::new(BorderReference::ReferenceLine, 0.0);
        continuous.push(0.0, Polynomial::new(3.0, 0.1, 0.0, 0.0));
        continuous.push(5.0, Polynomial::new(3.5, 0.1, 0.0, 0.0));
        assert!((continuous.width_at(5.0, true) - continuous.width_at(5.0, false)).abs() < 1e-12);
    }

    #[test]
    fn cycles_are_caught() {
        let mut borders = Borders::new(9);
        // The first border refers ahead to the second one
        let a = borders.add(Border::new(BorderReference::Border(BorderId(1)), 0.0));
        let b = borders.add(Border::new(BorderReference::Border(a), 0.0));
        match borders.offset(b, 1.0, false) {
            Err(Error::CyclicBorder { road, hops }) => {
                assert_eq!(road, 9);
                assert_eq!(hops, MAX_BORDER_HOPS + 1);
            }
            x => panic!("expected a cycle, got {:?}", x),
        }
    }

    #[test]
    fn empty_reference_border() {
        let border = Border::reference_border(&[]);
        assert_eq!(border.width_coefficients, vec![Polynomial::ZERO]);
        assert_eq!(border.width_at(12.0, false), 0.0);
    }
}
