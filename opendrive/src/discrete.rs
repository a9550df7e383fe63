use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use abstutil::{deserialize_btreemap, serialize_btreemap};
use geom::{Bounds, Pt3D};

use crate::lanes::{BorderSide, ParametricLaneGroup};
use crate::raw::LaneType;
use crate::{BorderPoint, Borders, Elevation, LaneKey, ReferenceLine, Result};

/// A lane sampled into polylines. Vertices run in the lane's direction of travel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscreteLane {
    pub id: LaneKey,
    pub lane_type: LaneType,
    pub left_vertices: Vec<Pt3D>,
    pub center_vertices: Vec<Pt3D>,
    pub right_vertices: Vec<Pt3D>,
    /// For every vertex, the distance along the lane where it was sampled.
    pub s_params: Vec<f64>,
    pub predecessors: BTreeSet<LaneKey>,
    pub successors: BTreeSet<LaneKey>,
}

impl DiscreteLane {
    pub fn road(&self) -> i64 {
        self.id.road
    }

    pub fn section(&self) -> usize {
        self.id.section
    }

    pub fn lane(&self) -> i64 {
        self.id.lane
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::new();
        for pt in self
            .left_vertices
            .iter()
            .chain(self.center_vertices.iter())
            .chain(self.right_vertices.iter())
        {
            bounds.update(pt.to_2d());
        }
        bounds
    }
}

/// Every converted lane, keyed and enumerated by ID.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscreteNetwork {
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    lanes: BTreeMap<LaneKey, DiscreteLane>,
}

impl DiscreteNetwork {
    pub fn new() -> DiscreteNetwork {
        DiscreteNetwork::default()
    }

    /// Returns false and leaves the network alone if the lane is already present.
    pub fn add_lane(&mut self, lane: DiscreteLane) -> bool {
        if self.lanes.contains_key(&lane.id) {
            warn!("Lane {} is already in the network", lane.id);
            return false;
        }
        self.lanes.insert(lane.id, lane);
        true
    }

    pub fn get(&self, id: LaneKey) -> Option<&DiscreteLane> {
        self.lanes.get(&id)
    }

    pub fn contains(&self, id: LaneKey) -> bool {
        self.lanes.contains_key(&id)
    }

    pub fn lanes(&self) -> impl Iterator<Item = &DiscreteLane> {
        self.lanes.values()
    }

    pub(crate) fn lanes_mut(&mut self) -> impl Iterator<Item = &mut DiscreteLane> {
        self.lanes.values_mut()
    }

    pub fn lane_ids(&self) -> Vec<LaneKey> {
        self.lanes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// The extent of every vertex of every lane. Empty if there are no lanes.
    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::new();
        for lane in self.lanes.values() {
            bounds.union(&lane.bounds());
        }
        bounds
    }
}

/// Samples a lane group at roughly `precision` spacing. Each width segment gets at least 2
/// samples; where one segment ends exactly where the next begins, the shared point appears once.
pub fn discretize_group(
    group: &ParametricLaneGroup,
    line: &ReferenceLine,
    borders: &Borders,
    elevation: Option<&Elevation>,
    precision: f64,
) -> Result<DiscreteLane> {
    let to_3d = |pt: BorderPoint| -> Pt3D {
        let z = elevation.map(|e| e.height(pt.ref_s, pt.t)).unwrap_or(0.0);
        pt.pos.to_3d(z)
    };

    let mut left_vertices: Vec<Pt3D> = Vec::new();
    let mut right_vertices: Vec<Pt3D> = Vec::new();
    let mut s_params = Vec::new();
    for (idx, plane) in group.parametric_lanes.iter().enumerate() {
        let num_steps = ((plane.length / precision).ceil() as usize).max(2);
        let step = plane.length / ((num_steps - 1) as f64);
        let start = group.geo_lengths()[idx];

        for i in 0..num_steps {
            let pos = if i == num_steps - 1 {
                plane.length
            } else {
                (i as f64) * step
            };
            let left = to_3d(plane.calc_border(line, borders, BorderSide::Inner, pos)?);
            let right = to_3d(plane.calc_border(line, borders, BorderSide::Outer, pos)?);

            if i == 0 {
                if let (Some(prev_left), Some(prev_right)) =
                    (left_vertices.last(), right_vertices.last())
                {
                    if prev_left.approx_eq(left) && prev_right.approx_eq(right) {
                        continue;
                    }
                }
            }
            left_vertices.push(left);
            right_vertices.push(right);
            s_params.push(start + pos);
        }
    }

    let center_vertices = left_vertices
        .iter()
        .zip(right_vertices.iter())
        .map(|(l, r)| l.midpoint(*r))
        .collect();
    Ok(DiscreteLane {
        id: group.key,
        lane_type: group.lane_type.clone(),
        left_vertices,
        center_vertices,
        right_vertices,
        s_params,
        predecessors: BTreeSet::new(),
        successors: BTreeSet::new(),
    })
}

#[cfg(test)]
mod tests {
    use geom::{Angle, Polynomial, Pt2D};

    use super::*;
    use crate::lanes::ParametricLane;
    use crate::{Border, BorderReference, CurveSegment};

    /// A right lane of width 3 along a straight 10m line, split into two width segments.
    fn setup(second_width: f64) -> (ReferenceLine, Borders, ParametricLaneGroup) {
        let line = ReferenceLine::new(
            1,
            vec![CurveSegment::line(Pt2D::zero(), Angle::ZERO, 10.0)],
        )
        .unwrap();
        let mut borders = Borders::new(1);
        let reference = borders.add(Border::reference_border(&[]));
        let mut outer = Border::new(BorderReference::Border(reference), 0.0);
        outer.push(0.0, Polynomial::constant(-3.0));
        outer.push(4.0, Polynomial::constant(-second_width));
        let outer = borders.add(outer);

        let key = LaneKey::new(1, 0, -1);
        let mut group = ParametricLaneGroup::new(key, LaneType::Driving);
        for (idx, (offset, length)) in [(0.0, 4.0), (4.0, 6.0)].iter().enumerate() {
            group.append(ParametricLane {
                key: key.with_width(idx),
                lane_type: LaneType::Driving,
                length: *length,
                inner_border: reference,
                outer_border: outer,
                inner_border_offset: *offset,
                outer_border_offset: *offset,
                reverse: false,
            });
        }
        (line, borders, group)
    }

    #[test]
    fn shared_points_appear_once() {
        let (line, borders, group) = setup(3.0);
        let lane = discretize_group(&group, &line, &borders, None, 1.0).unwrap();
        // 4 samples on the first segment, 6 on the second, minus the shared one
        assert_eq!(lane.left_vertices.len(), 9);
        assert_eq!(lane.s_params.len(), 9);
        assert_eq!(lane.s_params[3], 4.0);
        assert!((lane.s_params[4] - 5.2).abs() < 1e-12);
        assert!(lane.center_vertices[3].approx_eq(Pt3D::new(4.0, -1.5, 0.0)));
        assert!(lane.right_vertices[8].approx_eq(Pt3D::new(10.0, -3.0, 0.0)));
    }

    #[test]
    fn discontinuities_are_kept() {
        let (line, borders, group) = setup(4.0);
        let lane = discretize_group(&group, &line, &borders, None, 1.0).unwrap();
        assert_eq!(lane.left_vertices.len(), 10);
        assert!(lane.right_vertices[3].approx_eq(Pt3D::new(4.0, -3.0, 0.0)));
        assert!(lane.right_vertices[4].approx_eq(Pt3D::new(4.0, -4.0, 0.0)));
    }

    #[test]
    fn at_least_two_samples() {
        let (line, borders, group) = setup(3.0);
        let lane = discretize_group(&group, &line, &borders, None, 100.0).unwrap();
        assert_eq!(lane.left_vertices.len(), 3);
        assert_eq!(lane.s_params, vec![0.0, 4.0, 10.0]);
    }

    #[test]
    fn network_bounds() {
        let (line, borders, group) = setup(3.0);
        let mut network = DiscreteNetwork::new();
        assert!(network.bounds().is_empty());
        let lane = discretize_group(&group, &line, &borders, None, 0.5).unwrap();
        assert!(network.add_lane(lane.clone()));
        assert!(!network.add_lane(lane));
        let bounds = network.bounds();
        assert!(bounds.min_x.abs() < 1e-9);
        assert!((bounds.max_x - 10.0).abs() < 1e-9);
        assert!((bounds.min_y + 3.0).abs() < 1e-9);
        assert!(bounds.max_y.abs() < 1e-9);
    }
}
