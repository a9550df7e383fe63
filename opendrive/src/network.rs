use std::collections::BTreeSet;

use abstutil::{prettyprint_usize, Timer};
use geom::{Bounds, Pt2D};

use crate::discrete::discretize_group;
use crate::lanes::{lane_section_to_parametric_lanes, BorderSide, ParametricLaneGroup};
use crate::raw::{LaneType, OpenDrive, Road};
use crate::{
    Border, Borders, DiscreteLane, DiscreteNetwork, Elevation, Error, LaneKey, LinkIndex,
    LinkWarning, ReferenceLine, Result,
};

/// Controls a conversion.
#[derive(Clone, Debug)]
pub struct Options {
    /// Distance between samples along each lane.
    pub precision: f64,
    /// Only lanes of these types are produced. `None` keeps everything.
    pub filter_types: Option<BTreeSet<LaneType>>,
    /// Spacing of the reference line cache for curved segments. `None` evaluates every curve
    /// exactly.
    pub cache_step: Option<f64>,
    /// When a road can't be converted, drop it and continue instead of failing.
    pub skip_bad_roads: bool,
    /// Convert roads on a thread pool. The result is identical either way.
    pub parallel: bool,
    /// Fill in heights from the elevation and lateral profiles. Otherwise everything is flat.
    pub elevation: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            precision: 0.5,
            filter_types: None,
            cache_step: Some(0.5),
            skip_bad_roads: false,
            parallel: false,
            elevation: true,
        }
    }
}

impl Options {
    /// The lane types a traffic replay cares about.
    pub fn replay_defaults() -> Options {
        Options {
            filter_types: Some(
                vec![
                    LaneType::Driving,
                    LaneType::Biking,
                    LaneType::OnRamp,
                    LaneType::OffRamp,
                    LaneType::Exit,
                    LaneType::Entry,
                    LaneType::Sidewalk,
                    LaneType::Bidirectional,
                ]
                .into_iter()
                .collect(),
            ),
            ..Default::default()
        }
    }

    /// Sampling distances have to be positive and finite.
    pub fn validate(&self) -> Result<()> {
        let distances = [("precision", Some(self.precision)), ("cache_step", self.cache_step)];
        for (name, value) in distances {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(Error::InvalidOption { name, value });
                }
            }
        }
        Ok(())
    }

    pub fn keep(&self, lane_type: &LaneType) -> bool {
        match self.filter_types {
            Some(ref types) => types.contains(lane_type),
            None => true,
        }
    }
}

/// Everything needed to evaluate lane positions on one road.
#[derive(Clone, Debug)]
pub struct RoadGeometry {
    pub road: i64,
    pub reference_line: ReferenceLine,
    pub borders: Borders,
    pub groups: Vec<ParametricLaneGroup>,
    pub elevation: Elevation,
}

impl RoadGeometry {
    pub fn build(road: &Road, opts: &Options) -> Result<RoadGeometry> {
        let mut reference_line = ReferenceLine::new(road.id, road.plan_view.clone())?;
        for (idx, gap) in reference_line.contiguity_gaps() {
            warn!(
                "road {}: geometry {} starts {:.3}m away from where the previous one ends",
                road.id, idx, gap
            );
        }
        if let Some(step) = opts.cache_step {
            reference_line.precalculate(step);
        }

        let mut borders = Borders::new(road.id);
        let reference = borders.add(Border::reference_border(&road.lane_offsets));
        let mut groups = Vec::new();
        for section in &road.sections {
            groups.extend(lane_section_to_parametric_lanes(
                road.id,
                section,
                reference,
                &mut borders,
            ));
        }

        Ok(RoadGeometry {
            road: road.id,
            reference_line,
            borders,
            groups,
            elevation: Elevation::from_road(road),
        })
    }

    pub fn group(&self, key: LaneKey) -> Option<&ParametricLaneGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// Samples every lane group of a kept type. Links are filled in later.
    pub fn discretize(&self, opts: &Options) -> Result<Vec<DiscreteLane>> {
        let elevation = if opts.elevation && !self.elevation.is_flat() {
            Some(&self.elevation)
        } else {
            None
        };
        let mut lanes = Vec::new();
        for group in &self.groups {
            if !opts.keep(&group.lane_type) {
                continue;
            }
            lanes.push(discretize_group(
                group,
                &self.reference_line,
                &self.borders,
                elevation,
                opts.precision,
            )?);
        }
        Ok(lanes)
    }

    /// The midpoint between a lane's borders, `s` along the lane.
    pub fn lane_center(&self, key: LaneKey, s: f64) -> Result<Option<Pt2D>> {
        let group = match self.group(key) {
            Some(g) => g,
            None => return Ok(None),
        };
        let inner = group.calc_border(&self.reference_line, &self.borders, BorderSide::Inner, s)?;
        let outer = group.calc_border(&self.reference_line, &self.borders, BorderSide::Outer, s)?;
        Ok(Some(Pt2D::new(
            (inner.pos.x() + outer.pos.x()) / 2.0,
            (inner.pos.y() + outer.pos.y()) / 2.0,
        )))
    }
}

/// A road that couldn't be converted, and why.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedRoad {
    pub road: i64,
    pub error: Error,
}

/// Every road's parametric lanes, plus how they're linked.
pub struct ParametricNetwork {
    pub roads: Vec<RoadGeometry>,
    pub link_index: LinkIndex,
    pub skipped_roads: Vec<SkippedRoad>,
}

impl ParametricNetwork {
    pub fn from_opendrive(
        doc: &OpenDrive,
        opts: &Options,
        timer: &mut Timer,
    ) -> Result<ParametricNetwork> {
        opts.validate()?;
        timer.start("link lanes");
        let link_index = LinkIndex::create_from_opendrive(doc);
        timer.note(format!(
            "{} lane links, {} dropped",
            prettyprint_usize(link_index.num_links()),
            prettyprint_usize(link_index.warnings().len())
        ));
        timer.stop("link lanes");

        let road_refs: Vec<&Road> = doc.roads.iter().collect();
        let results = if opts.parallel {
            timer.parallelize("build road geometry", road_refs, |road| {
                RoadGeometry::build(road, opts)
            })
        } else {
            timer.start_iter("build road geometry", road_refs.len());
            road_refs
                .into_iter()
                .map(|road| {
                    timer.next();
                    RoadGeometry::build(road, opts)
                })
                .collect()
        };

        let mut roads = Vec::new();
        let mut skipped_roads = Vec::new();
        for (road, result) in doc.roads.iter().zip(results) {
            match result {
                Ok(geometry) => roads.push(geometry),
                Err(err) => skip_or_fail(road.id, err, opts, timer, &mut skipped_roads)?,
            }
        }

        Ok(ParametricNetwork {
            roads,
            link_index,
            skipped_roads,
        })
    }

    /// Samples every kept lane and attaches its links. Links to lanes that didn't make it into
    /// the output are left out.
    pub fn export_discrete_network(
        &mut self,
        opts: &Options,
        timer: &mut Timer,
    ) -> Result<DiscreteNetwork> {
        opts.validate()?;
        let road_refs: Vec<&RoadGeometry> = self.roads.iter().collect();
        let results = if opts.parallel {
            timer.parallelize("discretize lanes", road_refs, |road| road.discretize(opts))
        } else {
            timer.start_iter("discretize lanes", road_refs.len());
            road_refs
                .into_iter()
                .map(|road| {
                    timer.next();
                    road.discretize(opts)
                })
                .collect()
        };

        let mut network = DiscreteNetwork::new();
        let mut failed = Vec::new();
        for (road, result) in self.roads.iter().zip(results) {
            match result {
                Ok(lanes) => {
                    for lane in lanes {
                        network.add_lane(lane);
                    }
                }
                Err(err) => skip_or_fail(road.road, err, opts, timer, &mut failed)?,
            }
        }
        self.skipped_roads.extend(failed);

        let ids: BTreeSet<LaneKey> = network.lane_ids().into_iter().collect();
        for lane in network.lanes_mut() {
            lane.predecessors = self
                .link_index
                .predecessors(lane.id)
                .into_iter()
                .filter(|id| ids.contains(id))
                .collect();
            lane.successors = self
                .link_index
                .successors(lane.id)
                .into_iter()
                .filter(|id| ids.contains(id))
                .collect();
        }
        Ok(network)
    }
}

fn skip_or_fail(
    road: i64,
    err: Error,
    opts: &Options,
    timer: &mut Timer,
    skipped: &mut Vec<SkippedRoad>,
) -> Result<()> {
    if opts.skip_bad_roads && err.road().is_some() {
        timer.warn(format!("Skipping road {}: {}", road, err));
        skipped.push(SkippedRoad { road, error: err });
        Ok(())
    } else {
        Err(err)
    }
}

/// The result of converting a document.
pub struct Conversion {
    pub network: DiscreteNetwork,
    /// Covers every vertex in `network`
    pub bounds: Bounds,
    pub link_warnings: Vec<LinkWarning>,
    pub skipped_roads: Vec<SkippedRoad>,
}

/// Converts a parsed document into sampled lanes.
pub fn convert(doc: &OpenDrive, opts: &Options, timer: &mut Timer) -> Result<Conversion> {
    let mut parametric = ParametricNetwork::from_opendrive(doc, opts, timer)?;
    let network = parametric.export_discrete_network(opts, timer)?;
    let bounds = network.bounds();
    timer.note(format!(
        "{} lanes from {} roads",
        prettyprint_usize(network.len()),
        prettyprint_usize(doc.roads.len())
    ));

    Ok(Conversion {
        network,
        bounds,
        link_warnings: parametric.link_index.warnings().to_vec(),
        skipped_roads: parametric.skipped_roads,
    })
}
