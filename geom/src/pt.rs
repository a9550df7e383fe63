use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{almost_equal, Angle};

/// A position in the plane, in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pt2D {
    x: f64,
    y: f64,
}

impl Pt2D {
    pub fn new(x: f64, y: f64) -> Pt2D {
        if !x.is_finite() || !y.is_finite() {
            panic!("Bad Pt2D {}, {}", x, y);
        }
        Pt2D { x, y }
    }

    pub fn zero() -> Pt2D {
        Pt2D::new(0.0, 0.0)
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    pub fn offset(self, dx: f64, dy: f64) -> Pt2D {
        Pt2D::new(self.x + dx, self.y + dy)
    }

    /// Moves `dist` along `theta`. Negative distances move the opposite way, which is how lateral
    /// offsets to the right of a reference line are expressed.
    pub fn project_away(self, dist: f64, theta: Angle) -> Pt2D {
        let (sin, cos) = theta.radians().sin_cos();
        Pt2D::new(self.x + dist * cos, self.y + dist * sin)
    }

    pub fn dist_to(self, to: Pt2D) -> f64 {
        ((self.x - to.x).powi(2) + (self.y - to.y).powi(2)).sqrt()
    }

    /// True if both coordinates are within `EPSILON_DIST`.
    pub fn approx_eq(self, other: Pt2D) -> bool {
        almost_equal(self.x, other.x) && almost_equal(self.y, other.y)
    }

    pub fn to_3d(self, z: f64) -> Pt3D {
        Pt3D::new(self.x, self.y, z)
    }
}

impl fmt::Display for Pt2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pt2D({0}, {1})", self.x, self.y)
    }
}

/// A sampled lane vertex. `z` is the elevation, or 0 when elevation isn't tracked.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pt3D {
    x: f64,
    y: f64,
    z: f64,
}

impl Pt3D {
    pub fn new(x: f64, y: f64, z: f64) -> Pt3D {
        if !x.is_finite() || !y.is_finite() || !z.is_finite() {
            panic!("Bad Pt3D {}, {}, {}", x, y, z);
        }
        Pt3D { x, y, z }
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    pub fn z(self) -> f64 {
        self.z
    }

    pub fn to_2d(self) -> Pt2D {
        Pt2D::new(self.x, self.y)
    }

    pub fn midpoint(self, other: Pt3D) -> Pt3D {
        Pt3D::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }

    pub fn approx_eq(self, other: Pt3D) -> bool {
        almost_equal(self.x, other.x)
            && almost_equal(self.y, other.y)
            && almost_equal(self.z, other.z)
    }
}

impl fmt::Display for Pt3D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pt3D({0}, {1}, {2})", self.x, self.y, self.z)
    }
}
