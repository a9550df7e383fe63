#![allow(dead_code)]

//! Builds small OpenDRIVE documents inline.

use abstutil::Timer;
use opendrive::{convert, Conversion, OpenDrive, Options};

pub fn document(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" standalone="yes"?>
<OpenDRIVE>
    <header revMajor="1" revMinor="6" name="test" version="1"/>
    {}
</OpenDRIVE>"#,
        body
    )
}

pub fn line(x: f64, y: f64, hdg: f64, length: f64) -> String {
    format!(
        r#"<geometry s="0" x="{}" y="{}" hdg="{}" length="{}"><line/></geometry>"#,
        x, y, hdg, length
    )
}

pub fn arc(x: f64, y: f64, hdg: f64, length: f64, curvature: f64) -> String {
    format!(
        r#"<geometry s="0" x="{}" y="{}" hdg="{}" length="{}"><arc curvature="{}"/></geometry>"#,
        x, y, hdg, length, curvature
    )
}

/// `junction` is -1 for ordinary roads.
pub fn road(id: i64, junction: i64, link: &str, plan_view: &str, sections: &str) -> String {
    format!(
        r#"<road id="{}" junction="{}" length="0">
    <link>{}</link>
    <planView>{}</planView>
    <lanes>{}</lanes>
</road>"#,
        id, junction, link, plan_view, sections
    )
}

pub fn section(s: f64, left: &str, right: &str) -> String {
    format!(
        r#"<laneSection s="{}">
    <left>{}</left>
    <center><lane id="0" type="none" level="false"/></center>
    <right>{}</right>
</laneSection>"#,
        s, left, right
    )
}

/// A lane with a constant width. `link` goes inside the lane's `<link>`.
pub fn lane(id: i64, lane_type: &str, width: f64, link: &str) -> String {
    format!(
        r#"<lane id="{}" type="{}" level="false">
    <link>{}</link>
    <width sOffset="0" a="{}" b="0" c="0" d="0"/>
</lane>"#,
        id, lane_type, link, width
    )
}

pub fn options() -> Options {
    Options {
        precision: 1.0,
        ..Options::default()
    }
}

pub fn run(xml: &str, opts: &Options) -> Conversion {
    let doc = OpenDrive::parse(xml).unwrap();
    convert(&doc, opts, &mut Timer::throwaway()).unwrap()
}
