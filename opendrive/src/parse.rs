use geom::{Angle, Polynomial, Pt2D};

use crate::raw::{
    Connection, ContactPoint, Crossfall, CrossfallSide, ElementLink, ElementType, Header,
    Junction, Lane, LaneLink, LaneSection, LaneType, LaneWidth, Neighbor, OpenDrive, PolyRecord,
    Road, RoadLink, RoadType, Shape, Speed,
};
use crate::{CurveKind, CurveSegment, Error, ParamRange, Result};

impl OpenDrive {
    /// Parses a whole `.xodr` document. Unknown elements are ignored; missing required structure
    /// is an error naming the offending element.
    pub fn parse(xml: &str) -> Result<OpenDrive> {
        let tree = roxmltree::Document::parse(xml)?;
        let root = Element {
            node: tree.root_element(),
            path: String::new(),
        };
        if root.node.tag_name().name() != "OpenDRIVE" {
            return Err(Error::document(
                root.node.tag_name().name(),
                "root element isn't OpenDRIVE",
            ));
        }

        let mut doc = OpenDrive::default();
        if let Some(header) = root.child("header") {
            doc.header = Some(parse_header(&header)?);
        }
        for junction in root.children("junction") {
            doc.junctions.push(parse_junction(&junction)?);
        }
        for road in root.children("road") {
            doc.roads.push(parse_road(&road)?);
        }
        Ok(doc)
    }
}

/// An XML element plus a human-readable path to it, for error messages.
struct Element<'a, 'input> {
    node: roxmltree::Node<'a, 'input>,
    path: String,
}

impl<'a, 'input> Element<'a, 'input> {
    fn join(&self, part: String) -> String {
        if self.path.is_empty() {
            part
        } else {
            format!("{}/{}", self.path, part)
        }
    }

    fn child(&self, tag: &str) -> Option<Element<'a, 'input>> {
        self.node
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == tag)
            .map(|node| Element {
                node,
                path: self.join(tag.to_string()),
            })
    }

    fn required_child(&self, tag: &str) -> Result<Element<'a, 'input>> {
        self.child(tag)
            .ok_or_else(|| Error::document(self.path.clone(), format!("missing <{}>", tag)))
    }

    fn children(&self, tag: &str) -> Vec<Element<'a, 'input>> {
        self.node
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == tag)
            .enumerate()
            .map(|(idx, node)| Element {
                node,
                path: self.join(format!("{}[{}]", tag, idx)),
            })
            .collect()
    }

    /// The first element child, whatever its tag.
    fn first_element_child(&self) -> Option<Element<'a, 'input>> {
        self.node.children().find(|n| n.is_element()).map(|node| Element {
            node,
            path: self.join(node.tag_name().name().to_string()),
        })
    }

    fn attr(&self, key: &str) -> Option<&'a str> {
        self.node.attribute(key)
    }

    fn string(&self, key: &str) -> Option<String> {
        self.attr(key).map(|x| x.to_string())
    }

    fn error<M: Into<String>>(&self, message: M) -> Error {
        Error::document(self.path.clone(), message)
    }

    fn opt_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.attr(key) {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(Some(x)),
                _ => Err(self.error(format!("{}=\"{}\" isn't a finite number", key, raw))),
            },
            None => Ok(None),
        }
    }

    fn f64(&self, key: &str) -> Result<f64> {
        self.opt_f64(key)?
            .ok_or_else(|| self.error(format!("missing attribute {}", key)))
    }

    fn opt_u32(&self, key: &str) -> Result<Option<u32>> {
        match self.opt_i64(key)? {
            Some(x) => u32::try_from(x).map(Some).map_err(|_| {
                self.error(format!("{}=\"{}\" isn't a non-negative integer", key, x))
            }),
            None => Ok(None),
        }
    }

    fn opt_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.attr(key) {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| self.error(format!("{}=\"{}\" isn't an integer", key, raw))),
            None => Ok(None),
        }
    }

    fn i64(&self, key: &str) -> Result<i64> {
        self.opt_i64(key)?
            .ok_or_else(|| self.error(format!("missing attribute {}", key)))
    }

    /// The `a`, `b`, `c`, `d` attributes.
    fn poly(&self) -> Result<Polynomial> {
        Ok(Polynomial::new(
            self.f64("a")?,
            self.f64("b")?,
            self.f64("c")?,
            self.f64("d")?,
        ))
    }

    fn poly_record(&self) -> Result<PolyRecord> {
        Ok(PolyRecord {
            s: self.f64("s")?,
            poly: self.poly()?,
        })
    }

    fn contact_point(&self) -> Result<Option<ContactPoint>> {
        match self.attr("contactPoint") {
            Some("start") => Ok(Some(ContactPoint::Start)),
            Some("end") => Ok(Some(ContactPoint::End)),
            Some(x) => Err(self.error(format!("unknown contactPoint {}", x))),
            None => Ok(None),
        }
    }
}

fn parse_header(el: &Element) -> Result<Header> {
    Ok(Header {
        rev_major: el.opt_u32("revMajor")?,
        rev_minor: el.opt_u32("revMinor")?,
        name: el.string("name"),
        version: el.string("version"),
        date: el.string("date"),
        north: el.opt_f64("north")?,
        south: el.opt_f64("south")?,
        east: el.opt_f64("east")?,
        west: el.opt_f64("west")?,
        vendor: el.string("vendor"),
        geo_reference: el
            .child("geoReference")
            .and_then(|g| g.node.text().map(|t| t.trim().to_string())),
    })
}

fn parse_junction(el: &Element) -> Result<Junction> {
    let id = el.i64("id")?;
    let el = Element {
        node: el.node,
        path: format!("junction[id={}]", id),
    };

    let mut connections = Vec::new();
    for conn in el.children("connection") {
        let contact_point = conn
            .contact_point()?
            .ok_or_else(|| conn.error("missing attribute contactPoint"))?;
        let mut lane_links = Vec::new();
        for link in conn.children("laneLink") {
            lane_links.push(LaneLink {
                from: link.i64("from")?,
                to: link.i64("to")?,
            });
        }
        connections.push(Connection {
            id: conn.string("id"),
            incoming_road: conn.i64("incomingRoad")?,
            connecting_road: conn.i64("connectingRoad")?,
            contact_point,
            lane_links,
        });
    }
    Ok(Junction {
        id,
        name: el.string("name"),
        connections,
    })
}

fn parse_road(el: &Element) -> Result<Road> {
    let id = el.i64("id")?;
    // Name roads by ID in error messages; the position among siblings is less useful.
    let el = Element {
        node: el.node,
        path: format!("road[id={}]", id),
    };

    let junction = match el.opt_i64("junction")? {
        Some(-1) | None => None,
        Some(j) => Some(j),
    };

    let mut link = RoadLink::default();
    if let Some(link_el) = el.child("link") {
        link.predecessor = link_el
            .child("predecessor")
            .map(|x| parse_element_link(&x))
            .transpose()?;
        link.successor = link_el
            .child("successor")
            .map(|x| parse_element_link(&x))
            .transpose()?;
        for neighbor in link_el.children("neighbor") {
            link.neighbors.push(Neighbor {
                side: neighbor.string("side"),
                element_id: neighbor.i64("elementId")?,
                direction: neighbor.string("direction"),
            });
        }
    }

    let mut types = Vec::new();
    for t in el.children("type") {
        types.push(RoadType {
            s: t.f64("s")?,
            road_type: t.string("type").unwrap_or_default(),
            speed: t.child("speed").map(|speed| Speed {
                max: speed.string("max"),
                unit: speed.string("unit"),
            }),
        });
    }

    let plan_view_el = el.required_child("planView")?;
    let mut plan_view = Vec::new();
    for geometry in plan_view_el.children("geometry") {
        plan_view.push(parse_geometry(&geometry)?);
    }
    if plan_view.is_empty() {
        return Err(plan_view_el.error("no geometry"));
    }

    let mut elevation = Vec::new();
    if let Some(profile) = el.child("elevationProfile") {
        for record in profile.children("elevation") {
            elevation.push(record.poly_record()?);
        }
    }

    let mut superelevation = Vec::new();
    let mut crossfall = Vec::new();
    let mut shapes = Vec::new();
    if let Some(profile) = el.child("lateralProfile") {
        for record in profile.children("superelevation") {
            superelevation.push(record.poly_record()?);
        }
        for record in profile.children("crossfall") {
            let side = match record.attr("side") {
                Some("left") => CrossfallSide::Left,
                Some("right") => CrossfallSide::Right,
                Some("both") | None => CrossfallSide::Both,
                Some(x) => return Err(record.error(format!("unknown crossfall side {}", x))),
            };
            crossfall.push(Crossfall {
                s: record.f64("s")?,
                poly: record.poly()?,
                side,
            });
        }
        for record in profile.children("shape") {
            shapes.push(Shape {
                s: record.f64("s")?,
                t: record.f64("t")?,
                poly: record.poly()?,
            });
        }
    }
    sort_by_s(&mut elevation);
    sort_by_s(&mut superelevation);
    crossfall.sort_by(|a, b| a.s.total_cmp(&b.s));
    shapes.sort_by(|a, b| a.s.total_cmp(&b.s).then(a.t.total_cmp(&b.t)));

    let lanes_el = el.required_child("lanes")?;

    // A later record at the same s replaces an earlier one.
    let mut offsets_by_s: Vec<PolyRecord> = Vec::new();
    for record in lanes_el.children("laneOffset") {
        let record = record.poly_record()?;
        offsets_by_s.retain(|r| r.s != record.s);
        offsets_by_s.push(record);
    }
    sort_by_s(&mut offsets_by_s);

    let mut sections = Vec::new();
    for (idx, section) in lanes_el.children("laneSection").into_iter().enumerate() {
        sections.push(parse_lane_section(&section, idx)?);
    }
    if sections.is_empty() {
        return Err(lanes_el.error("no laneSection"));
    }

    let mut road = Road {
        id,
        name: el.string("name"),
        length: el.opt_f64("length")?.unwrap_or(0.0),
        junction,
        link,
        types,
        plan_view,
        elevation,
        superelevation,
        crossfall,
        shapes,
        lane_offsets: offsets_by_s,
        sections,
    };
    calculate_lengths(&mut road);
    Ok(road)
}

fn sort_by_s(records: &mut Vec<PolyRecord>) {
    records.sort_by(|a, b| a.s.total_cmp(&b.s));
}

fn parse_element_link(el: &Element) -> Result<ElementLink> {
    let element_type = match el.attr("elementType") {
        Some("road") | None => ElementType::Road,
        Some("junction") => ElementType::Junction,
        Some(x) => return Err(el.error(format!("unknown elementType {}", x))),
    };
    Ok(ElementLink {
        element_type,
        element_id: el.i64("elementId")?,
        contact_point: el.contact_point()?,
    })
}

fn parse_geometry(el: &Element) -> Result<CurveSegment> {
    let start = Pt2D::new(el.f64("x")?, el.f64("y")?);
    let heading = Angle::new(el.f64("hdg")?);
    let length = el.f64("length")?;
    if length < 0.0 {
        return Err(el.error(format!("negative length {}", length)));
    }

    let shape = el
        .first_element_child()
        .ok_or_else(|| el.error("no curve type"))?;
    let kind = match shape.node.tag_name().name() {
        "line" => CurveKind::Line,
        "arc" => CurveKind::Arc {
            curvature: shape.f64("curvature")?,
        },
        "spiral" => CurveKind::Spiral {
            curv_start: shape.f64("curvStart")?,
            curv_end: shape.f64("curvEnd")?,
        },
        "poly3" => CurveKind::Poly3(shape.poly()?),
        "paramPoly3" => CurveKind::ParamPoly3 {
            u: Polynomial::new(
                shape.f64("aU")?,
                shape.f64("bU")?,
                shape.f64("cU")?,
                shape.f64("dU")?,
            ),
            v: Polynomial::new(
                shape.f64("aV")?,
                shape.f64("bV")?,
                shape.f64("cV")?,
                shape.f64("dV")?,
            ),
            p_range: match shape.attr("pRange") {
                Some("arcLength") => ParamRange::ArcLength,
                _ => ParamRange::Normalized,
            },
        },
        x => return Err(shape.error(format!("unknown curve type {}", x))),
    };
    Ok(CurveSegment {
        start,
        heading,
        length,
        kind,
    })
}

/// A missing side just has no lanes.
fn parse_side(el: &Element, side: &str) -> Result<Vec<Lane>> {
    let mut lanes = Vec::new();
    if let Some(side_el) = el.child(side) {
        for lane in side_el.children("lane") {
            lanes.push(parse_lane(&lane)?);
        }
    }
    Ok(lanes)
}

fn parse_lane_section(el: &Element, idx: usize) -> Result<LaneSection> {
    let mut left = parse_side(el, "left")?;
    let center = parse_side(el, "center")?;
    let mut right = parse_side(el, "right")?;
    left.sort_by_key(|l| l.id);
    right.sort_by_key(|l| -l.id);

    Ok(LaneSection {
        idx,
        s: el.f64("s")?,
        single_side: matches!(el.attr("singleSide"), Some("true") | Some("1")),
        length: 0.0,
        left,
        center,
        right,
    })
}

fn parse_lane(el: &Element) -> Result<Lane> {
    let id = el.i64("id")?;
    let lane_type = LaneType::from_tag(el.attr("type").unwrap_or("none"));
    if !lane_type.is_known() {
        warn!("{}: unknown lane type {}", el.path, lane_type);
    }

    let mut predecessor = None;
    let mut successor = None;
    if let Some(link) = el.child("link") {
        if let Some(x) = link.child("predecessor") {
            predecessor = Some(x.i64("id")?);
        }
        if let Some(x) = link.child("successor") {
            successor = Some(x.i64("id")?);
        }
    }

    let mut widths = parse_widths(el, "width")?;
    let mut has_border_record = false;
    if widths.is_empty() {
        widths = parse_widths(el, "border")?;
        has_border_record = !widths.is_empty();
    }

    Ok(Lane {
        id,
        lane_type,
        level: matches!(el.attr("level"), Some("true") | Some("1")),
        predecessor,
        successor,
        widths,
        has_border_record,
    })
}

fn parse_widths(el: &Element, tag: &str) -> Result<Vec<LaneWidth>> {
    let mut widths = Vec::new();
    for width in el.children(tag) {
        widths.push(LaneWidth {
            idx: 0,
            s_offset: width.f64("sOffset")?,
            length: 0.0,
            poly: width.poly()?,
        });
    }
    // Stable, so records sharing an sOffset keep their order
    widths.sort_by(|a, b| a.s_offset.total_cmp(&b.s_offset));
    for (idx, width) in widths.iter_mut().enumerate() {
        width.idx = idx;
    }
    Ok(widths)
}

/// Fills in section lengths from the reference line, then width segment lengths from the
/// sections.
fn calculate_lengths(road: &mut Road) {
    let total = road.plan_view_length();
    let starts: Vec<f64> = road.sections.iter().map(|s| s.s).collect();
    for (idx, section) in road.sections.iter_mut().enumerate() {
        let end = starts.get(idx + 1).cloned().unwrap_or(total);
        section.length = end - section.s;
        let section_length = section.length;

        for lane in section
            .left
            .iter_mut()
            .chain(section.center.iter_mut())
            .chain(section.right.iter_mut())
        {
            let offsets: Vec<f64> = lane.widths.iter().map(|w| w.s_offset).collect();
            for (i, width) in lane.widths.iter_mut().enumerate() {
                let end = offsets.get(i + 1).cloned().unwrap_or(section_length);
                width.length = end - width.s_offset;
            }
        }
    }
}
