//! Utilities shared by the converter crates: a hierarchical phase timer, logger setup, and JSON
//! helpers. Nothing in here knows about roads.

#[macro_use]
extern crate log;

mod io;
pub mod logger;
mod time;

pub use crate::io::{deserialize_btreemap, serialize_btreemap, to_json, write_json};
pub use crate::time::{elapsed_seconds, prettyprint_time, prettyprint_usize, Timer};

const PROGRESS_FREQUENCY_SECONDS: f64 = 0.2;
