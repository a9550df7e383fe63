use serde::{Deserialize, Serialize};

use crate::raw::{Lane, LaneSection, LaneType, LaneWidth};
use crate::{
    Border, BorderId, BorderPoint, BorderReference, Borders, LaneKey, ReferenceLine, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BorderSide {
    /// Towards the reference line
    Inner,
    Outer,
}

/// One width segment of a lane: the area between two borders over a stretch of `s`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParametricLane {
    pub key: LaneKey,
    pub lane_type: LaneType,
    pub length: f64,
    pub inner_border: BorderId,
    pub outer_border: BorderId,
    /// Added to positions along this segment to get positions in each border's coordinates.
    pub inner_border_offset: f64,
    pub outer_border_offset: f64,
    /// Left lanes run against the reference line, so they're traversed from their end.
    pub reverse: bool,
}

impl ParametricLane {
    /// `pos` runs from 0 to `length` in the direction of travel.
    pub fn calc_border(
        &self,
        line: &ReferenceLine,
        borders: &Borders,
        side: BorderSide,
        pos: f64,
    ) -> Result<BorderPoint> {
        let border_pos = if self.reverse {
            self.length - pos
        } else {
            pos
        };
        // The far end of this segment belongs to the polynomials that end there
        let closing = border_pos >= self.length;
        match side {
            BorderSide::Inner => borders.calc(
                line,
                self.inner_border,
                self.inner_border_offset + border_pos,
                closing,
            ),
            BorderSide::Outer => borders.calc(
                line,
                self.outer_border,
                self.outer_border_offset + border_pos,
                closing,
            ),
        }
    }
}

/// All width segments of one lane in one lane section, in the lane's direction of travel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParametricLaneGroup {
    pub key: LaneKey,
    pub lane_type: LaneType,
    pub inner_neighbour: LaneKey,
    pub inner_neighbour_same_direction: bool,
    pub outer_neighbour: LaneKey,
    pub parametric_lanes: Vec<ParametricLane>,
    /// `geo_lengths[i]` is where `parametric_lanes[i]` begins; the last entry is the total.
    geo_lengths: Vec<f64>,
}

impl ParametricLaneGroup {
    pub fn new(key: LaneKey, lane_type: LaneType) -> ParametricLaneGroup {
        let (inner_neighbour, outer_neighbour, inner_neighbour_same_direction) =
            determine_neighbours(key);
        ParametricLaneGroup {
            key,
            lane_type,
            inner_neighbour,
            inner_neighbour_same_direction,
            outer_neighbour,
            parametric_lanes: Vec::new(),
            geo_lengths: vec![0.0],
        }
    }

    /// Reversed lanes go in front of everything already added.
    pub fn append(&mut self, lane: ParametricLane) {
        let length = lane.length;
        if lane.reverse {
            self.parametric_lanes.insert(0, lane);
            self.geo_lengths.insert(1, length);
            for x in self.geo_lengths.iter_mut().skip(2) {
                *x += length;
            }
        } else {
            self.parametric_lanes.push(lane);
            let total = self.length();
            self.geo_lengths.push(total + length);
        }
    }

    pub fn length(&self) -> f64 {
        *self.geo_lengths.last().unwrap()
    }

    pub fn geo_lengths(&self) -> &[f64] {
        &self.geo_lengths
    }

    /// Finds the width segment covering `s`, along with the position within it.
    pub fn locate(&self, s: f64) -> (usize, f64) {
        let count = self.parametric_lanes.len();
        let idx = self.geo_lengths[..count]
            .partition_point(|start| *start <= s)
            .saturating_sub(1)
            .min(count.saturating_sub(1));
        (idx, s - self.geo_lengths[idx])
    }

    pub fn calc_border(
        &self,
        line: &ReferenceLine,
        borders: &Borders,
        side: BorderSide,
        s: f64,
    ) -> Result<BorderPoint> {
        let (idx, pos) = self.locate(s);
        self.parametric_lanes[idx].calc_border(line, borders, side, pos)
    }
}

/// The lanes on either side of a lane, and whether the inner one travels the same way. Lanes 1
/// and -1 share the reference line as their inner border, so they're each other's inner
/// neighbour.
pub fn determine_neighbours(key: LaneKey) -> (LaneKey, LaneKey, bool) {
    let (inner, outer, same_direction) = match key.lane {
        1 => (-1, 2, false),
        -1 => (1, -2, false),
        id if id > 0 => (id - 1, id + 1, true),
        id => (id + 1, id - 1, true),
    };
    (
        LaneKey::new(key.road, key.section, inner),
        LaneKey::new(key.road, key.section, outer),
        same_direction,
    )
}

/// Builds the borders and parametric lanes for one lane section. `reference` is the road's
/// reference border, measured in road coordinates; everything created here is measured from the
/// start of the section.
pub fn lane_section_to_parametric_lanes(
    road: i64,
    section: &LaneSection,
    reference: BorderId,
    borders: &mut Borders,
) -> Vec<ParametricLaneGroup> {
    let mut groups = Vec::new();
    for (lanes, coeff_factor) in [(&section.right, -1.0), (&section.left, 1.0)] {
        // The outer border of every lane processed so far, starting at the reference line
        let mut lane_borders = vec![reference];
        for lane in lanes {
            let inner_border = *lane_borders.last().unwrap();
            let outer_border =
                create_outer_lane_border(&lane_borders, lane, coeff_factor, section.s, borders);
            lane_borders.push(outer_border);

            let key = LaneKey::new(road, section.idx, lane.id);
            let mut group = ParametricLaneGroup::new(key, lane.lane_type.clone());
            // The reference border is in road coordinates; every other one is in section
            // coordinates.
            let inner_base = if inner_border == reference {
                section.s
            } else {
                0.0
            };
            for width in &lane.widths {
                if width.length <= 0.0 {
                    continue;
                }
                group.append(create_parametric_lane(
                    key, lane, width, inner_border, outer_border, inner_base,
                ));
            }

            if group.length() > 0.0 {
                groups.push(group);
            }
        }
    }
    groups
}

fn create_parametric_lane(
    key: LaneKey,
    lane: &Lane,
    width: &LaneWidth,
    inner_border: BorderId,
    outer_border: BorderId,
    inner_base: f64,
) -> ParametricLane {
    ParametricLane {
        key: key.with_width(width.idx),
        lane_type: lane.lane_type.clone(),
        length: width.length,
        inner_border,
        outer_border,
        inner_border_offset: width.s_offset + inner_base,
        outer_border_offset: width.s_offset,
        reverse: lane.id > 0,
    }
}

/// A lane's outer border is its width stacked on its inner neighbour's outer border. Lanes given
/// by explicit border records are measured straight from the reference border instead.
fn create_outer_lane_border(
    lane_borders: &[BorderId],
    lane: &Lane,
    coeff_factor: f64,
    section_start: f64,
    borders: &mut Borders,
) -> BorderId {
    let mut border = if lane.has_border_record || lane_borders.len() == 1 {
        Border::new(BorderReference::Border(lane_borders[0]), section_start)
    } else {
        Border::new(BorderReference::Border(*lane_borders.last().unwrap()), 0.0)
    };
    for width in &lane.widths {
        border.push(width.s_offset, width.poly.scaled(coeff_factor));
    }
    borders.add(border)
}

#[cfg(test)]
mod tests {
    use geom::{Angle, Polynomial, Pt2D};

    use super::*;
    use crate::raw::PolyRecord;
    use crate::CurveSegment;

    fn lane(id: i64, widths: Vec<(f64, f64, Polynomial)>) -> Lane {
        Lane {
            id,
            lane_type: LaneType::Driving,
            level: false,
            predecessor: None,
            successor: None,
            widths: widths
                .into_iter()
                .enumerate()
                .map(|(idx, (s_offset, length, poly))| LaneWidth {
                    idx,
                    s_offset,
                    length,
                    poly,
                })
                .collect(),
            has_border_record: false,
        }
    }

    fn section(s: f64, length: f64, left: Vec<Lane>, right: Vec<Lane>) -> LaneSection {
        LaneSection {
            idx: 1,
            s,
            single_side: false,
            length,
            left,
            center: Vec::new(),
            right,
        }
    }

    fn straight(length: f64) -> ReferenceLine {
        ReferenceLine::new(1, vec![CurveSegment::line(Pt2D::zero(), Angle::ZERO, length)])
            .unwrap()
    }

    #[test]
    fn neighbours() {
        let key = |lane| LaneKey::new(1, 0, lane);
        assert_eq!(determine_neighbours(key(1)), (key(-1), key(2), false));
        assert_eq!(determine_neighbours(key(-1)), (key(1), key(-2), false));
        assert_eq!(determine_neighbours(key(3)), (key(2), key(4), true));
        assert_eq!(determine_neighbours(key(-3)), (key(-2), key(-4), true));
    }

    #[test]
    fn reversed_lanes_are_prepended() {
        let mut group = ParametricLaneGroup::new(LaneKey::new(1, 0, 1), LaneType::Driving);
        for (idx, length) in [2.0, 3.0, 5.0].iter().enumerate() {
            group.append(ParametricLane {
                key: LaneKey::new(1, 0, 1).with_width(idx),
                lane_type: LaneType::Driving,
                length: *length,
                inner_border: BorderId(0),
                outer_border: BorderId(1),
                inner_border_offset: 0.0,
                outer_border_offset: 0.0,
                reverse: true,
            });
        }
        assert_eq!(group.geo_lengths(), &[0.0, 5.0, 8.0, 10.0]);
        assert_eq!(group.parametric_lanes[0].key.width, 2);
        assert_eq!(group.locate(6.0), (1, 1.0));
        assert_eq!(group.locate(10.0), (2, 2.0));
    }

    #[test]
    fn borders_stack_outwards() {
        // Second section of a road, starting at s=10, with a constant lane offset of 0.5
        let line = straight(30.0);
        let mut borders = Borders::new(1);
        let reference = borders.add(Border::reference_border(&[PolyRecord {
            s: 0.0,
            poly: Polynomial::constant(0.5),
        }]));
        let sec = section(
            10.0,
            20.0,
            vec![lane(1, vec![(0.0, 20.0, Polynomial::constant(3.0))])],
            vec![
                lane(-1, vec![(0.0, 20.0, Polynomial::constant(3.5))]),
                lane(
                    -2,
                    vec![
                        (0.0, 5.0, Polynomial::new(2.0, 0.2, 0.0, 0.0)),
                        (5.0, 15.0, Polynomial::constant(3.0)),
                    ],
                ),
            ],
        );
        let groups = lane_section_to_parametric_lanes(1, &sec, reference, &mut borders);
        assert_eq!(
            groups.iter().map(|g| g.key.lane).collect::<Vec<_>>(),
            vec![-1, -2, 1]
        );

        // Lane -1 at section s=2 is road s=12
        let inner = groups[0]
            .calc_border(&line, &borders, BorderSide::Inner, 2.0)
            .unwrap();
        assert!(inner.pos.approx_eq(Pt2D::new(12.0, 0.5)));
        let outer = groups[0]
            .calc_border(&line, &borders, BorderSide::Outer, 2.0)
            .unwrap();
        assert!(outer.pos.approx_eq(Pt2D::new(12.0, -3.0)));

        // Lane -2 narrows... then jumps at its width segment boundary
        let end_of_first = groups[1]
            .parametric_lanes[0]
            .calc_border(&line, &borders, BorderSide::Outer, 5.0)
            .unwrap();
        assert!((end_of_first.t - (0.5 - 3.5 - 3.0)).abs() < 1e-12);
        let start_of_second = groups[1]
            .parametric_lanes[1]
            .calc_border(&line, &borders, BorderSide::Outer, 0.0)
            .unwrap();
        assert!((start_of_second.t - (0.5 - 3.5 - 3.0)).abs() < 1e-12);
        assert_eq!(end_of_first.ref_s, 15.0);

        // Lane 1 runs backwards: its start is the end of the section
        let start = groups[2]
            .calc_border(&line, &borders, BorderSide::Outer, 0.0)
            .unwrap();
        assert!(start.pos.approx_eq(Pt2D::new(30.0, 3.5)));
        assert!(!groups[2].inner_neighbour_same_direction);
    }

    #[test]
    fn explicit_borders_use_the_reference() {
        let line = straight(30.0);
        let mut borders = Borders::new(1);
        let reference = borders.add(Border::reference_border(&[]));
        let mut bordered = lane(-2, vec![(0.0, 10.0, Polynomial::constant(5.0))]);
        bordered.has_border_record = true;
        let sec = section(
            10.0,
            10.0,
            Vec::new(),
            vec![lane(-1, vec![(0.0, 10.0, Polynomial::constant(3.0))]), bordered],
        );
        let groups = lane_section_to_parametric_lanes(1, &sec, reference, &mut borders);
        let inner = groups[1]
            .calc_border(&line, &borders, BorderSide::Inner, 4.0)
            .unwrap();
        let outer = groups[1]
            .calc_border(&line, &borders, BorderSide::Outer, 4.0)
            .unwrap();
        assert!(inner.pos.approx_eq(Pt2D::new(14.0, -3.0)));
        assert!(outer.pos.approx_eq(Pt2D::new(14.0, -5.0)));
    }
}
