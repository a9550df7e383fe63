//! `xodr` turns OpenDRIVE road networks into sampled lane polylines, and inspects them along the
//! way.

#[macro_use]
extern crate log;

mod topology;

use std::collections::BTreeSet;

use anyhow::Result;
use structopt::StructOpt;

use abstutil::Timer;
use opendrive::{LaneType, Options};

#[derive(StructOpt)]
#[structopt(name = "xodr", about = "Converts OpenDRIVE maps into lane polylines")]
enum Command {
    /// Samples every lane and writes the network as JSON
    Convert {
        /// The path to an .xodr file
        #[structopt(long)]
        input: String,
        /// Where to write the JSON. Prints to stdout if omitted.
        #[structopt(long)]
        output: Option<String>,
        /// Distance in meters between samples along a lane
        #[structopt(long, default_value = "0.5")]
        precision: f64,
        /// Keep every lane type. By default, only lanes that vehicles, bikes, and pedestrians
        /// travel along are kept.
        #[structopt(long)]
        all_types: bool,
        /// A comma-separated list of lane types to keep, like `driving,sidewalk`
        #[structopt(long, conflicts_with = "all-types")]
        types: Option<String>,
        /// Build roads on a thread pool
        #[structopt(long)]
        parallel: bool,
        /// Leave out roads with broken geometry instead of failing
        #[structopt(long)]
        skip_bad_roads: bool,
        /// Put every vertex at z = 0
        #[structopt(long)]
        flat: bool,
    },
    /// Prints the bounding box of every lane
    Bounds {
        /// The path to an .xodr file
        #[structopt(long)]
        input: String,
    },
    /// Prints each lane's predecessors and successors
    Topology {
        /// The path to an .xodr file
        #[structopt(long)]
        input: String,
    },
}

fn main() -> Result<()> {
    abstutil::logger::setup();

    match Command::from_args() {
        Command::Convert {
            input,
            output,
            precision,
            all_types,
            types,
            parallel,
            skip_bad_roads,
            flat,
        } => {
            let opts = Options {
                precision,
                filter_types: lane_types(all_types, types),
                parallel,
                skip_bad_roads,
                elevation: !flat,
                ..Options::replay_defaults()
            };
            convert(input, output, opts)?;
        }
        Command::Bounds { input } => {
            let opts = Options {
                filter_types: None,
                ..Options::default()
            };
            let result = opendrive::load(&input, &opts, &mut Timer::new("calculate bounds"))?;
            let b = result.bounds;
            println!(
                "x: {} to {}, y: {} to {} ({:.1}m x {:.1}m)",
                b.min_x,
                b.max_x,
                b.min_y,
                b.max_y,
                b.width(),
                b.height()
            );
        }
        Command::Topology { input } => topology::run(input)?,
    }
    Ok(())
}

fn lane_types(all_types: bool, types: Option<String>) -> Option<BTreeSet<LaneType>> {
    if all_types {
        return None;
    }
    match types {
        Some(list) => Some(
            list.split(',')
                .map(|x| x.trim())
                .filter(|x| !x.is_empty())
                .map(|x| {
                    let lane_type = LaneType::from_tag(x);
                    if !lane_type.is_known() {
                        warn!("{} isn't a known lane type; keeping it anyway", x);
                    }
                    lane_type
                })
                .collect(),
        ),
        None => Options::replay_defaults().filter_types,
    }
}

fn convert(input: String, output: Option<String>, opts: Options) -> Result<()> {
    let mut timer = Timer::new(format!("convert {}", input));
    let result = opendrive::load(&input, &opts, &mut timer)?;

    for skipped in &result.skipped_roads {
        timer.warn(format!("Road {} skipped: {}", skipped.road, skipped.error));
    }
    if !result.link_warnings.is_empty() {
        timer.note(format!(
            "{} declared links point nowhere",
            abstutil::prettyprint_usize(result.link_warnings.len())
        ));
    }

    match output {
        Some(path) => {
            abstutil::write_json(&path, &result.network)?;
            info!(
                "Wrote {} lanes to {}",
                abstutil::prettyprint_usize(result.network.len()),
                path
            );
        }
        None => println!("{}", abstutil::to_json(&result.network)),
    }
    Ok(())
}
