//! Converts OpenDRIVE road networks into sampled lanes.
//!
//! A road's reference line is a chain of curve segments. Lanes are bounded by borders: lateral
//! offset polynomials stacked outwards from that line. Every lane of every lane section becomes a
//! `DiscreteLane` with left, center, and right polylines, linked to the lanes before and after it
//! within the road, across road boundaries, and through junctions.
//!
//! ```no_run
//! let mut timer = abstutil::Timer::new("convert");
//! let result = opendrive::load("town.xodr", &opendrive::Options::default(), &mut timer).unwrap();
//! println!("{} lanes within {:?}", result.network.len(), result.bounds);
//! ```

#[macro_use]
extern crate log;

mod border;
mod curve;
mod discrete;
mod elevation;
mod error;
mod lanes;
mod links;
mod network;
mod parse;
mod plan_view;
pub mod raw;

use anyhow::Result as AnyResult;

use abstutil::Timer;

pub use crate::border::{
    Border, BorderId, BorderPoint, BorderReference, Borders, MAX_BORDER_HOPS,
};
pub use crate::curve::{CurveKind, CurveSegment, ParamRange};
pub use crate::discrete::{discretize_group, DiscreteLane, DiscreteNetwork};
pub use crate::elevation::Elevation;
pub use crate::error::{Error, Result};
pub use crate::lanes::{
    determine_neighbours, lane_section_to_parametric_lanes, BorderSide, ParametricLane,
    ParametricLaneGroup,
};
pub use crate::links::{LaneKey, LinkIndex, LinkReason, LinkWarning};
pub use crate::network::{
    convert, Conversion, Options, ParametricNetwork, RoadGeometry, SkippedRoad,
};
pub use crate::plan_view::{ReferenceLine, CONTIGUITY_TOLERANCE, RANGE_TOLERANCE};
pub use crate::raw::{LaneType, MapKind, OpenDrive};

/// Reads and converts an `.xodr` file.
pub fn load(path: &str, opts: &Options, timer: &mut Timer) -> AnyResult<Conversion> {
    timer.start(format!("read {}", path));
    let raw = fs_err::read_to_string(path)?;
    let doc = OpenDrive::parse(&raw)?;
    timer.stop(format!("read {}", path));

    Ok(convert(&doc, opts, timer)?)
}
