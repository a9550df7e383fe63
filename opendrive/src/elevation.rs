use serde::{Deserialize, Serialize};

use crate::raw::{Crossfall, CrossfallSide, PolyRecord, Road, Shape};

/// Height of the road surface: the elevation profile along the reference line, tilted by
/// superelevation and crossfall, plus any lateral shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Elevation {
    elevation: Vec<PolyRecord>,
    superelevation: Vec<PolyRecord>,
    crossfall: Vec<Crossfall>,
    shapes: Vec<Shape>,
}

impl Elevation {
    pub fn from_road(road: &Road) -> Elevation {
        Elevation {
            elevation: road.elevation.clone(),
            superelevation: road.superelevation.clone(),
            crossfall: road.crossfall.clone(),
            shapes: road.shapes.clone(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.elevation.is_empty()
            && self.superelevation.is_empty()
            && self.crossfall.is_empty()
            && self.shapes.is_empty()
    }

    /// Height at `s` along the reference line, `t` to the left of it.
    pub fn height(&self, s: f64, t: f64) -> f64 {
        let mut z = eval_records(&self.elevation, s);

        // Superelevation rolls the whole cross-section; positive lowers the right side.
        z += t * eval_records(&self.superelevation, s).tan();

        // Crossfall drops away from the reference line on the sides it applies to.
        if let Some(record) = active(&self.crossfall, |r| r.s, s) {
            let applies = match record.side {
                CrossfallSide::Both => true,
                CrossfallSide::Left => t > 0.0,
                CrossfallSide::Right => t < 0.0,
            };
            if applies {
                z -= t.abs() * record.poly.eval(s - record.s).tan();
            }
        }

        z + self.shape_height(s, t)
    }

    fn shape_height(&self, s: f64, t: f64) -> f64 {
        let group_s = match active(&self.shapes, |r| r.s, s) {
            Some(record) => record.s,
            None => return 0.0,
        };
        let group: Vec<&Shape> = self.shapes.iter().filter(|r| r.s == group_s).collect();
        let idx = group
            .partition_point(|r| r.t <= t)
            .saturating_sub(1);
        let record = group[idx];
        record.poly.eval(t - record.t)
    }
}

/// The last record starting at or before `s`, or the first one if `s` comes before all of them.
fn active<T, F: Fn(&T) -> f64>(records: &[T], start: F, s: f64) -> Option<&T> {
    if records.is_empty() {
        return None;
    }
    let idx = records.partition_point(|r| start(r) <= s).saturating_sub(1);
    Some(&records[idx])
}

fn eval_records(records: &[PolyRecord], s: f64) -> f64 {
    active(records, |r| r.s, s)
        .map(|r| r.poly.eval(s - r.s))
        .unwrap_or(0.0)
}
