use anyhow::Result;
use itertools::Itertools;

use opendrive::{LaneKey, LinkIndex, OpenDrive};

/// Prints every lane's links, one lane per line. Only the document's links are resolved; no
/// geometry is built.
pub fn run(input: String) -> Result<()> {
    let raw = fs_err::read_to_string(&input)?;
    let doc = OpenDrive::parse(&raw)?;
    let index = LinkIndex::create_from_opendrive(&doc);
    if let Some(ref header) = doc.header {
        println!("{} ({:?})", input, header.map_kind());
    }

    for road in &doc.roads {
        for section in &road.sections {
            for lane in section.side_lanes() {
                let key = LaneKey::new(road.id, section.idx, lane.id);
                println!(
                    "{} ({}): from [{}] to [{}]",
                    key,
                    lane.lane_type,
                    index.predecessors(key).into_iter().join(", "),
                    index.successors(key).into_iter().join(", ")
                );
            }
        }
    }

    for warning in index.warnings() {
        println!("{}", warning);
    }
    println!(
        "{} links, {} dropped",
        index.num_links(),
        index.warnings().len()
    );
    Ok(())
}
