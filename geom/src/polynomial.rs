use serde::{Deserialize, Serialize};

/// `a + b*x + c*x^2 + d*x^3`, the shape of every polynomial record in an OpenDRIVE file (widths,
/// borders, offsets, elevation, superelevation, poly3 reference lines).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Polynomial {
    pub const ZERO: Polynomial = Polynomial::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(a: f64, b: f64, c: f64, d: f64) -> Polynomial {
        Polynomial { a, b, c, d }
    }

    pub fn constant(a: f64) -> Polynomial {
        Polynomial::new(a, 0.0, 0.0, 0.0)
    }

    pub fn eval(&self, x: f64) -> f64 {
        // Horner
        ((self.d * x + self.c) * x + self.b) * x + self.a
    }

    pub fn derivative(&self, x: f64) -> f64 {
        (3.0 * self.d * x + 2.0 * self.c) * x + self.b
    }

    /// Every coefficient multiplied by `factor`. Right-side lane widths are stored negated.
    pub fn scaled(&self, factor: f64) -> Polynomial {
        Polynomial::new(
            self.a * factor,
            self.b * factor,
            self.c * factor,
            self.d * factor,
        )
    }
}
