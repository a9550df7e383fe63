use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A heading in radians, counter-clockwise from the +X axis. Not normalized; headings of
/// consecutive curve segments may legitimately wind past ±π.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);

    pub fn new(rads: f64) -> Angle {
        Angle(rads)
    }

    pub fn radians(self) -> f64 {
        self.0
    }

    /// In [0, 2π)
    pub fn normalized_radians(self) -> f64 {
        self.0.rem_euclid(2.0 * PI)
    }

    pub fn normalized_degrees(self) -> f64 {
        self.normalized_radians().to_degrees()
    }

    pub fn rotate_rads(self, rads: f64) -> Angle {
        Angle(self.0 + rads)
    }

    /// The signed rotation in [-π, π) that turns `self` into `other` the short way around.
    pub fn shortest_rotation_towards(self, other: Angle) -> f64 {
        ((other.0 - self.0) + PI).rem_euclid(2.0 * PI) - PI
    }

    /// Blends towards `other` by `pct` in [0, 1], going the short way around. Interpolating
    /// 179° and -179° passes through 180°, not 0°.
    pub fn lerp(self, other: Angle, pct: f64) -> Angle {
        Angle(self.0 + self.shortest_rotation_towards(other) * pct)
    }

    pub fn approx_eq(self, other: Angle, epsilon: f64) -> bool {
        self.shortest_rotation_towards(other).abs() < epsilon
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Angle({} degrees)", self.normalized_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_wraps_around() {
        let a = Angle::new(PI - 0.1);
        let b = Angle::new(-PI + 0.1);
        let mid = a.lerp(b, 0.5);
        assert!((mid.normalized_radians() - PI).abs() < 1e-9);
        assert!((a.shortest_rotation_towards(b) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn normalized() {
        assert!((Angle::new(-PI / 2.0).normalized_degrees() - 270.0).abs() < 1e-9);
        assert!(Angle::new(5.0 * PI).approx_eq(Angle::new(PI), 1e-9));
    }
}
