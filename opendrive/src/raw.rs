//! The OpenDRIVE document as it appears in the file, before any geometry is evaluated. Only the
//! parts the converter understands are kept.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use geom::Polynomial;

use crate::CurveSegment;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OpenDrive {
    pub header: Option<Header>,
    pub roads: Vec<Road>,
    pub junctions: Vec<Junction>,
}

impl OpenDrive {
    pub fn road(&self, id: i64) -> Option<&Road> {
        self.roads.iter().find(|r| r.id == id)
    }

    pub fn junction(&self, id: i64) -> Option<&Junction> {
        self.junctions.iter().find(|j| j.id == id)
    }

    /// Roads keyed by ID, for callers doing many lookups.
    pub fn roads_by_id(&self) -> BTreeMap<i64, &Road> {
        self.roads.iter().map(|r| (r.id, r)).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub rev_major: Option<u32>,
    pub rev_minor: Option<u32>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub date: Option<String>,
    pub north: Option<f64>,
    pub south: Option<f64>,
    pub east: Option<f64>,
    pub west: Option<f64>,
    pub vendor: Option<String>,
    /// Usually a proj4 string. Kept verbatim.
    pub geo_reference: Option<String>,
}

/// What a map depicts, guessed from its name. Consumers pick scenarios with this; the converter
/// itself never looks at it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapKind {
    Highway,
    Intersection,
    Ramp,
    Unknown,
}

impl Header {
    pub fn map_kind(&self) -> MapKind {
        let name = match self.name {
            Some(ref name) => name.to_lowercase(),
            None => return MapKind::Unknown,
        };
        if name.contains("highway") {
            MapKind::Highway
        } else if name.contains("intersection") {
            MapKind::Intersection
        } else if name.contains("ramp") || name.contains("merge") {
            MapKind::Ramp
        } else {
            MapKind::Unknown
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub id: i64,
    pub name: Option<String>,
    /// As declared. Geometry uses the sum of the reference line segments instead.
    pub length: f64,
    /// The junction this road belongs to, if it's a connecting road inside one.
    pub junction: Option<i64>,
    pub link: RoadLink,
    pub types: Vec<RoadType>,
    pub plan_view: Vec<CurveSegment>,
    pub elevation: Vec<PolyRecord>,
    pub superelevation: Vec<PolyRecord>,
    pub crossfall: Vec<Crossfall>,
    pub shapes: Vec<Shape>,
    /// Sorted by `s`, with at most one record per `s`.
    pub lane_offsets: Vec<PolyRecord>,
    pub sections: Vec<LaneSection>,
}

impl Road {
    /// The total length of the reference line.
    pub fn plan_view_length(&self) -> f64 {
        self.plan_view
            .iter()
            .filter(|g| g.length > 0.0)
            .map(|g| g.length)
            .sum()
    }

    pub fn last_section_idx(&self) -> usize {
        self.sections.len().saturating_sub(1)
    }

    pub fn is_junction_internal(&self) -> bool {
        self.junction.is_some()
    }
}

/// A cubic polynomial that takes effect at `s` along the road.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyRecord {
    pub s: f64,
    pub poly: Polynomial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossfallSide {
    Left,
    Right,
    Both,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Crossfall {
    pub s: f64,
    pub poly: Polynomial,
    pub side: CrossfallSide,
}

/// A lateral height profile, `h(dt)` with `dt` measured from `t`, starting at `s`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub s: f64,
    pub t: f64,
    pub poly: Polynomial,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadLink {
    pub predecessor: Option<ElementLink>,
    pub successor: Option<ElementLink>,
    pub neighbors: Vec<Neighbor>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementLink {
    pub element_type: ElementType,
    pub element_id: i64,
    pub contact_point: Option<ContactPoint>,
}

impl ElementLink {
    pub fn is_road(&self) -> bool {
        self.element_type == ElementType::Road
    }

    pub fn is_junction(&self, id: i64) -> bool {
        self.element_type == ElementType::Junction && self.element_id == id
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    Road,
    Junction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactPoint {
    Start,
    End,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub side: Option<String>,
    pub element_id: i64,
    pub direction: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadType {
    pub s: f64,
    pub road_type: String,
    pub speed: Option<Speed>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Speed {
    /// Sometimes "no limit" or "undefined", so not a number.
    pub max: Option<String>,
    pub unit: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaneSection {
    /// Position within the road's list of sections
    pub idx: usize,
    pub s: f64,
    pub single_side: bool,
    /// Up to the next section, or to the end of the reference line.
    pub length: f64,
    /// Sorted by ID ascending: 1, 2, 3...
    pub left: Vec<Lane>,
    pub center: Vec<Lane>,
    /// Sorted by ID descending: -1, -2, -3...
    pub right: Vec<Lane>,
}

impl LaneSection {
    pub fn lane(&self, id: i64) -> Option<&Lane> {
        self.all_lanes().find(|l| l.id == id)
    }

    pub fn all_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.left
            .iter()
            .chain(self.center.iter())
            .chain(self.right.iter())
    }

    /// Every lane except the center one, which never has any width.
    pub fn side_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.left.iter().chain(self.right.iter())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    /// 0 is the center, positive IDs are left of the reference line, negative are right.
    pub id: i64,
    pub lane_type: LaneType,
    pub level: bool,
    pub predecessor: Option<i64>,
    pub successor: Option<i64>,
    /// Sorted by `s_offset`. Filled from `border` records when a lane has no `width` records.
    pub widths: Vec<LaneWidth>,
    /// True if `widths` really describes the lane's outer border, not its width.
    pub has_border_record: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaneWidth {
    pub idx: usize,
    /// Relative to the start of the lane section
    pub s_offset: f64,
    pub length: f64,
    pub poly: Polynomial,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub id: i64,
    pub name: Option<String>,
    pub connections: Vec<Connection>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: Option<String>,
    pub incoming_road: i64,
    pub connecting_road: i64,
    pub contact_point: ContactPoint,
    pub lane_links: Vec<LaneLink>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneLink {
    pub from: i64,
    pub to: i64,
}

/// The `type` of a lane. Tags this crate doesn't know are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LaneType {
    None,
    Driving,
    Stop,
    Shoulder,
    Biking,
    Sidewalk,
    Border,
    Restricted,
    Parking,
    Bidirectional,
    Median,
    Special1,
    Special2,
    Special3,
    RoadWorks,
    Tram,
    Rail,
    Entry,
    Exit,
    OffRamp,
    OnRamp,
    ConnectingRamp,
    Bus,
    Taxi,
    Hov,
    MwyEntry,
    MwyExit,
    Other(String),
}

impl LaneType {
    pub fn from_tag(tag: &str) -> LaneType {
        match tag {
            "none" => LaneType::None,
            "driving" => LaneType::Driving,
            "stop" => LaneType::Stop,
            "shoulder" => LaneType::Shoulder,
            "biking" => LaneType::Biking,
            "sidewalk" => LaneType::Sidewalk,
            "border" => LaneType::Border,
            "restricted" => LaneType::Restricted,
            "parking" => LaneType::Parking,
            "bidirectional" => LaneType::Bidirectional,
            "median" => LaneType::Median,
            "special1" => LaneType::Special1,
            "special2" => LaneType::Special2,
            "special3" => LaneType::Special3,
            "roadWorks" => LaneType::RoadWorks,
            "tram" => LaneType::Tram,
            "rail" => LaneType::Rail,
            "entry" => LaneType::Entry,
            "exit" => LaneType::Exit,
            "offRamp" => LaneType::OffRamp,
            "onRamp" => LaneType::OnRamp,
            "connectingRamp" => LaneType::ConnectingRamp,
            "bus" => LaneType::Bus,
            "taxi" => LaneType::Taxi,
            "HOV" => LaneType::Hov,
            "mwyEntry" => LaneType::MwyEntry,
            "mwyExit" => LaneType::MwyExit,
            x => LaneType::Other(x.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LaneType::None => "none",
            LaneType::Driving => "driving",
            LaneType::Stop => "stop",
            LaneType::Shoulder => "shoulder",
            LaneType::Biking => "biking",
            LaneType::Sidewalk => "sidewalk",
            LaneType::Border => "border",
            LaneType::Restricted => "restricted",
            LaneType::Parking => "parking",
            LaneType::Bidirectional => "bidirectional",
            LaneType::Median => "median",
            LaneType::Special1 => "special1",
            LaneType::Special2 => "special2",
            LaneType::Special3 => "special3",
            LaneType::RoadWorks => "roadWorks",
            LaneType::Tram => "tram",
            LaneType::Rail => "rail",
            LaneType::Entry => "entry",
            LaneType::Exit => "exit",
            LaneType::OffRamp => "offRamp",
            LaneType::OnRamp => "onRamp",
            LaneType::ConnectingRamp => "connectingRamp",
            LaneType::Bus => "bus",
            LaneType::Taxi => "taxi",
            LaneType::Hov => "HOV",
            LaneType::MwyEntry => "mwyEntry",
            LaneType::MwyExit => "mwyExit",
            LaneType::Other(x) => x,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, LaneType::Other(_))
    }
}

impl fmt::Display for LaneType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for LaneType {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LaneType {
    fn deserialize<D>(d: D) -> Result<LaneType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = <String>::deserialize(d)?;
        Ok(LaneType::from_tag(&tag))
    }
}
