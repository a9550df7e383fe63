use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use abstutil::{deserialize_btreemap, serialize_btreemap};

use crate::raw::{Connection, ContactPoint, Lane, LaneType, OpenDrive, Road};

/// Identifies a lane within a lane section, and optionally one width segment of it. Linking
/// and output always use `width == -1`, meaning the whole lane.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneKey {
    pub road: i64,
    pub section: usize,
    pub lane: i64,
    pub width: i64,
}

impl LaneKey {
    pub fn new(road: i64, section: usize, lane: i64) -> LaneKey {
        LaneKey {
            road,
            section,
            lane,
            width: -1,
        }
    }

    pub fn with_width(self, width: usize) -> LaneKey {
        LaneKey {
            width: width as i64,
            ..self
        }
    }
}

impl fmt::Display for LaneKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.road, self.section, self.lane, self.width)
    }
}

impl fmt::Debug for LaneKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LaneKey({})", self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LinkReason {
    MissingRoad,
    MissingSection,
    MissingLane,
    /// Seeing through a chain of junction roads led to lanes of different types.
    AmbiguousJunctionChain,
}

/// A link that was declared but couldn't be added. `to` may name a road, section, or lane that
/// doesn't exist.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkWarning {
    pub from: LaneKey,
    pub to: LaneKey,
    pub reason: LinkReason,
}

impl fmt::Display for LinkWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "link {} -> {} dropped: {:?}", self.from, self.to, self.reason)
    }
}

/// Every lane-to-lane link in a document, all stored in the direction of travel. Predecessors
/// are the reverse of successors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkIndex {
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    successors: BTreeMap<LaneKey, BTreeSet<LaneKey>>,
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    predecessors: BTreeMap<LaneKey, BTreeSet<LaneKey>>,
    warnings: Vec<LinkWarning>,
}

/// Looks up roads and lanes by ID while linking.
struct Catalog<'a> {
    roads: BTreeMap<i64, &'a Road>,
}

impl<'a> Catalog<'a> {
    fn road(&self, id: i64) -> Option<&'a Road> {
        self.roads.get(&id).cloned()
    }

    fn lane(&self, key: LaneKey) -> Result<&'a Lane, LinkReason> {
        let road = self.road(key.road).ok_or(LinkReason::MissingRoad)?;
        let section = road
            .sections
            .get(key.section)
            .ok_or(LinkReason::MissingSection)?;
        section.lane(key.lane).ok_or(LinkReason::MissingLane)
    }

    fn is_junction_internal(&self, road: i64) -> bool {
        self.road(road)
            .map(|r| r.is_junction_internal())
            .unwrap_or(false)
    }
}

/// Which end of a lane a link is being looked for at.
#[derive(Clone, Copy, PartialEq)]
enum Toward {
    Successor,
    Predecessor,
}

impl LinkIndex {
    pub fn new() -> LinkIndex {
        LinkIndex::default()
    }

    /// Collects links from lanes following each other within roads, between roads that link
    /// directly, and through junctions.
    pub fn create_from_opendrive(doc: &OpenDrive) -> LinkIndex {
        let catalog = Catalog {
            roads: doc.roads_by_id(),
        };
        let mut index = LinkIndex::new();
        let junction_links = index.add_junctions(doc, &catalog);
        for road in &doc.roads {
            index.add_road(road, &catalog);
        }
        index.resolve_junction_chains(junction_links, &catalog);
        for warning in &index.warnings {
            warn!("{}", warning);
        }
        index
    }

    /// Records `from -> to`, or `to -> from` if `reverse`. Both lanes have to exist.
    fn add_link(
        &mut self,
        catalog: &Catalog,
        from: LaneKey,
        to: LaneKey,
        reverse: bool,
    ) -> bool {
        let (from, to) = if reverse { (to, from) } else { (from, to) };
        for key in [from, to] {
            if let Err(reason) = catalog.lane(key) {
                self.warnings.push(LinkWarning { from, to, reason });
                return false;
            }
        }
        self.insert(from, to);
        true
    }

    pub fn insert(&mut self, from: LaneKey, to: LaneKey) {
        self.successors.entry(from).or_default().insert(to);
        self.predecessors.entry(to).or_default().insert(from);
    }

    pub fn successors(&self, key: LaneKey) -> BTreeSet<LaneKey> {
        self.successors.get(&key).cloned().unwrap_or_default()
    }

    pub fn predecessors(&self, key: LaneKey) -> BTreeSet<LaneKey> {
        self.predecessors.get(&key).cloned().unwrap_or_default()
    }

    pub fn warnings(&self) -> &[LinkWarning] {
        &self.warnings
    }

    pub fn num_links(&self) -> usize {
        self.successors.values().map(|s| s.len()).sum()
    }

    fn add_road(&mut self, road: &Road, catalog: &Catalog) {
        let last = road.last_section_idx();
        for section in &road.sections {
            for lane in section.side_lanes() {
                let key = LaneKey::new(road.id, section.idx, lane.id);
                // Left lanes run against the reference line
                let reverse = lane.id >= 0;

                if section.idx < last {
                    let next = &road.sections[section.idx + 1];
                    let target = lane.successor.or_else(|| {
                        back_reference(&next.left, &next.right, lane.id, Toward::Predecessor)
                    });
                    if let Some(target) = target {
                        let next_key = LaneKey::new(road.id, section.idx + 1, target);
                        self.add_link(catalog, key, next_key, reverse);
                    }
                } else if let Some(ref link) = road.link.successor {
                    if link.is_road() {
                        self.link_to_road(
                            catalog,
                            key,
                            lane,
                            lane.successor,
                            (link.element_id, link.contact_point),
                            Toward::Successor,
                            reverse,
                        );
                    }
                }

                if section.idx > 0 {
                    let prev = &road.sections[section.idx - 1];
                    let target = lane.predecessor.or_else(|| {
                        back_reference(&prev.left, &prev.right, lane.id, Toward::Successor)
                    });
                    if let Some(target) = target {
                        let prev_key = LaneKey::new(road.id, section.idx - 1, target);
                        self.add_link(catalog, prev_key, key, reverse);
                    }
                } else if let Some(ref link) = road.link.predecessor {
                    if link.is_road() {
                        self.link_to_road(
                            catalog,
                            key,
                            lane,
                            lane.predecessor,
                            (link.element_id, link.contact_point),
                            Toward::Predecessor,
                            reverse,
                        );
                    }
                }
            }
        }
    }

    /// Links a lane at the end of its road to a lane of another road touching it.
    #[allow(clippy::too_many_arguments)]
    fn link_to_road(
        &mut self,
        catalog: &Catalog,
        key: LaneKey,
        lane: &Lane,
        declared: Option<i64>,
        (other_road, contact_point): (i64, Option<ContactPoint>),
        toward: Toward,
        reverse: bool,
    ) {
        let other = match catalog.road(other_road) {
            Some(r) => r,
            None => {
                if let Some(target) = declared {
                    let other = LaneKey::new(other_road, 0, target);
                    let (from, to) = match toward {
                        Toward::Successor => (key, other),
                        Toward::Predecessor => (other, key),
                    };
                    self.warnings.push(LinkWarning {
                        from,
                        to,
                        reason: LinkReason::MissingRoad,
                    });
                }
                return;
            }
        };
        let (section_idx, back_ref) = if contact_point == Some(ContactPoint::Start) {
            // The other road begins here, so its lanes point back with their predecessors
            (0, Toward::Predecessor)
        } else {
            (other.last_section_idx(), Toward::Successor)
        };
        let target = declared.or_else(|| {
            other
                .sections
                .get(section_idx)
                .and_then(|s| back_reference(&s.left, &s.right, lane.id, back_ref))
        });
        let target = match target {
            Some(t) => LaneKey::new(other.id, section_idx, t),
            None => return,
        };
        match toward {
            Toward::Successor => self.add_link(catalog, key, target, reverse),
            Toward::Predecessor => self.add_link(catalog, target, key, reverse),
        };
    }

    /// Adds the links declared by every junction connection, returning them in the direction of
    /// travel.
    fn add_junctions(&mut self, doc: &OpenDrive, catalog: &Catalog) -> Vec<(LaneKey, LaneKey)> {
        let mut added = Vec::new();
        for junction in &doc.junctions {
            for conn in &junction.connections {
                for lane_link in &conn.lane_links {
                    if let Some(pair) = self.add_connection_link(
                        catalog,
                        junction.id,
                        conn,
                        lane_link.from,
                        lane_link.to,
                    ) {
                        added.push(pair);
                    }
                }
            }
        }
        added
    }

    fn add_connection_link(
        &mut self,
        catalog: &Catalog,
        junction: i64,
        conn: &Connection,
        from: i64,
        to: i64,
    ) -> Option<(LaneKey, LaneKey)> {
        let incoming = match catalog.road(conn.incoming_road) {
            Some(r) => r,
            None => {
                self.warnings.push(LinkWarning {
                    from: LaneKey::new(conn.incoming_road, 0, from),
                    to: LaneKey::new(conn.connecting_road, 0, to),
                    reason: LinkReason::MissingRoad,
                });
                return None;
            }
        };
        let connecting = match catalog.road(conn.connecting_road) {
            Some(r) => r,
            None => {
                self.warnings.push(LinkWarning {
                    from: LaneKey::new(conn.incoming_road, 0, from),
                    to: LaneKey::new(conn.connecting_road, 0, to),
                    reason: LinkReason::MissingRoad,
                });
                return None;
            }
        };

        // Which end of the incoming road touches the junction? Trust the road's own links, and
        // fall back to guessing from the direction of the lane.
        let incoming_section = if incoming
            .link
            .successor
            .as_ref()
            .map(|l| l.is_junction(junction))
            .unwrap_or(false)
        {
            incoming.last_section_idx()
        } else if incoming
            .link
            .predecessor
            .as_ref()
            .map(|l| l.is_junction(junction))
            .unwrap_or(false)
        {
            0
        } else {
            match (conn.contact_point, from < 0) {
                (ContactPoint::Start, true) | (ContactPoint::End, false) => {
                    incoming.last_section_idx()
                }
                (ContactPoint::Start, false) | (ContactPoint::End, true) => 0,
            }
        };
        let incoming_key = LaneKey::new(incoming.id, incoming_section, from);

        let (connecting_key, reverse) = match conn.contact_point {
            // The connecting road continues the incoming lane along its reference line, unless
            // the target is a left lane.
            ContactPoint::Start => (LaneKey::new(connecting.id, 0, to), to > 0),
            ContactPoint::End => (
                LaneKey::new(connecting.id, connecting.last_section_idx(), to),
                to < 0,
            ),
        };
        if self.add_link(catalog, incoming_key, connecting_key, reverse) {
            Some(if reverse {
                (connecting_key, incoming_key)
            } else {
                (incoming_key, connecting_key)
            })
        } else {
            None
        }
    }

    /// Junctions sometimes chain connecting roads together. For every junction link touching a
    /// junction-internal lane, find the ordinary lanes feeding the chain and the lanes it leads
    /// into, and link those directly too. If they disagree about lane type, report it and skip.
    ///
    /// Links are in travel direction, so left and right lanes resolve the same way.
    fn resolve_junction_chains(&mut self, links: Vec<(LaneKey, LaneKey)>, catalog: &Catalog) {
        for (from, to) in links {
            if !catalog.is_junction_internal(from.road) && !catalog.is_junction_internal(to.road) {
                continue;
            }

            let sources = self.chain_ends(from, Toward::Predecessor, catalog);
            let sinks = self.chain_ends(to, Toward::Successor, catalog);
            let types: BTreeSet<LaneType> = sources
                .iter()
                .chain(sinks.iter())
                .filter_map(|k| catalog.lane(*k).ok())
                .map(|l| l.lane_type.clone())
                .collect();
            if types.len() > 1 {
                self.warnings.push(LinkWarning {
                    from,
                    to,
                    reason: LinkReason::AmbiguousJunctionChain,
                });
                continue;
            }
            for source in &sources {
                for sink in &sinks {
                    if source != sink {
                        self.insert(*source, *sink);
                    }
                }
            }
        }
    }

    /// Walks from `start` through junction-internal lanes. An ordinary lane ends the walk, and so
    /// does an internal lane with nowhere further to go.
    fn chain_ends(&self, start: LaneKey, toward: Toward, catalog: &Catalog) -> BTreeSet<LaneKey> {
        let mut ends = BTreeSet::new();
        let mut visited = BTreeSet::new();
        visited.insert(start);
        let mut queue = vec![start];
        while let Some(current) = queue.pop() {
            if !catalog.is_junction_internal(current.road) {
                ends.insert(current);
                continue;
            }
            let next = match toward {
                Toward::Successor => self.successors(current),
                Toward::Predecessor => self.predecessors(current),
            };
            if next.is_empty() {
                ends.insert(current);
            }
            for key in next {
                if visited.insert(key) {
                    queue.push(key);
                }
            }
        }
        ends
    }
}

/// When a lane doesn't declare where it leads, find the lane on the other side that declares a
/// link back to it. Only an unambiguous answer counts.
fn back_reference(left: &[Lane], right: &[Lane], lane: i64, toward: Toward) -> Option<i64> {
    let mut matches = left.iter().chain(right.iter()).filter(|other| {
        let declared = match toward {
            Toward::Successor => other.successor,
            Toward::Predecessor => other.predecessor,
        };
        declared == Some(lane)
    });
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formatting() {
        let key = LaneKey::new(501, 1, -1);
        assert_eq!(key.to_string(), "501.1.-1.-1");
        assert_eq!(format!("{:?}", key.with_width(2)), "LaneKey(501.1.-1.2)");
    }

    #[test]
    fn insert_is_idempotent() {
        let a = LaneKey::new(1, 0, -1);
        let b = LaneKey::new(2, 0, -1);
        let c = LaneKey::new(3, 0, -1);
        let mut index = LinkIndex::new();
        index.insert(a, b);
        index.insert(a, b);
        index.insert(b, c);
        assert_eq!(index.num_links(), 2);
        assert_eq!(index.predecessors(b), vec![a].into_iter().collect());
        assert_eq!(index.successors(b), vec![c].into_iter().collect());
        assert!(index.predecessors(a).is_empty());
    }
}
