//! Plain geometry value types used by the OpenDRIVE converter. Everything here is in world-space
//! meters (or radians), with Y increasing northbound like the source data.

mod angle;
mod bounds;
mod polynomial;
mod pt;

pub use crate::angle::Angle;
pub use crate::bounds::Bounds;
pub use crate::polynomial::Polynomial;
pub use crate::pt::{Pt2D, Pt3D};

/// Two positions closer than this are considered the same point when stitching polylines.
pub const EPSILON_DIST: f64 = 1.0e-8;

pub fn almost_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON_DIST
}
