mod common;

use std::collections::BTreeSet;

use abstutil::Timer;
use geom::{Angle, Pt2D};
use opendrive::{
    convert, CurveKind, CurveSegment, Error, LaneKey, LaneType, OpenDrive, Options,
    ParametricNetwork,
};

use common::{arc, document, lane, line, options, road, run, section};

fn close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

fn with_roads(xml: &str, roads: &str) -> String {
    xml.replace("</OpenDRIVE>", &format!("{}</OpenDRIVE>", roads))
}

fn straight_road() -> String {
    document(&road(
        1,
        -1,
        "",
        &line(0.0, 0.0, 0.0, 10.0),
        &section(
            0.0,
            &lane(1, "driving", 3.0, ""),
            &lane(-1, "driving", 3.5, ""),
        ),
    ))
}

#[test]
fn straight_line() {
    let result = run(&straight_road(), &options());
    assert_eq!(result.network.len(), 2);

    let right = result.network.get(LaneKey::new(1, 0, -1)).unwrap();
    assert_eq!(right.lane_type, LaneType::Driving);
    assert_eq!(right.center_vertices.len(), 10);
    assert_eq!(right.s_params.len(), 10);
    assert!(close(right.s_params[9], 10.0, 1e-9));
    for ((l, c), r) in right
        .left_vertices
        .iter()
        .zip(&right.center_vertices)
        .zip(&right.right_vertices)
    {
        assert!(close(l.y(), 0.0, 1e-9));
        assert!(close(c.y(), -1.75, 1e-9));
        assert!(close(r.y(), -3.5, 1e-9));
    }
    assert!(close(right.center_vertices[0].x(), 0.0, 1e-9));
    assert!(close(right.center_vertices[9].x(), 10.0, 1e-9));

    // Left lanes run against the reference line.
    let left = result.network.get(LaneKey::new(1, 0, 1)).unwrap();
    assert!(close(left.center_vertices[0].x(), 10.0, 1e-9));
    assert!(close(left.center_vertices[9].x(), 0.0, 1e-9));
    assert!(close(left.center_vertices[0].y(), 1.5, 1e-9));
    assert!(close(left.right_vertices[0].y(), 3.0, 1e-9));

    let b = result.bounds;
    assert!(close(b.min_x, 0.0, 1e-9) && close(b.max_x, 10.0, 1e-9));
    assert!(close(b.min_y, -3.5, 1e-9) && close(b.max_y, 3.0, 1e-9));
}

#[test]
fn arc_keeps_its_radius() {
    // Turning left around (0, 10)
    let xml = document(&road(
        1,
        -1,
        "",
        &arc(0.0, 0.0, 0.0, 10.0, 0.1),
        &section(0.0, "", &lane(-1, "driving", 2.0, "")),
    ));
    let result = run(&xml, &options());
    let lane = result.network.get(LaneKey::new(1, 0, -1)).unwrap();
    let center = Pt2D::new(0.0, 10.0);
    for pt in &lane.center_vertices {
        assert!(close(pt.to_2d().dist_to(center), 11.0, 1e-2), "{:?}", pt);
    }
    for pt in &lane.right_vertices {
        assert!(close(pt.to_2d().dist_to(center), 12.0, 1e-2), "{:?}", pt);
    }
}

fn two_widths(second: f64) -> String {
    let lane = format!(
        r#"<lane id="-1" type="driving" level="false">
    <width sOffset="0" a="3" b="0" c="0" d="0"/>
    <width sOffset="5" a="{}" b="0" c="0" d="0"/>
</lane>"#,
        second
    );
    document(&road(
        1,
        -1,
        "",
        &line(0.0, 0.0, 0.0, 10.0),
        &section(0.0, "", &lane),
    ))
}

#[test]
fn continuous_widths_share_a_vertex() {
    let result = run(&two_widths(3.0), &options());
    let lane = result.network.get(LaneKey::new(1, 0, -1)).unwrap();
    assert_eq!(lane.center_vertices.len(), 9);
    assert!(close(lane.s_params[4], 5.0, 1e-9));
    assert!(close(lane.s_params[5], 6.25, 1e-9));
}

#[test]
fn width_jumps_are_kept() {
    let result = run(&two_widths(4.0), &options());
    let lane = result.network.get(LaneKey::new(1, 0, -1)).unwrap();
    assert_eq!(lane.center_vertices.len(), 10);
    assert!(close(lane.right_vertices[4].x(), 5.0, 1e-9));
    assert!(close(lane.right_vertices[4].y(), -3.0, 1e-9));
    assert!(close(lane.right_vertices[5].x(), 5.0, 1e-9));
    assert!(close(lane.right_vertices[5].y(), -4.0, 1e-9));
    assert!(close(lane.s_params[4], lane.s_params[5], 1e-9));
}

fn geometry_xml(s: f64, segment: &CurveSegment, shape: &str) -> String {
    format!(
        r#"<geometry s="{}" x="{}" y="{}" hdg="{}" length="{}">{}</geometry>"#,
        s,
        segment.start.x(),
        segment.start.y(),
        segment.heading.normalized_radians(),
        segment.length,
        shape
    )
}

/// A line, an arc, and a spiral, chained end to end, with lanes that widen and a lane offset.
fn winding_road() -> String {
    let mut segments = vec![CurveSegment::line(Pt2D::zero(), Angle::ZERO, 5.0)];
    let mut shapes = vec!["<line/>".to_string()];
    for (kind, shape) in [
        (
            CurveKind::Arc { curvature: 0.05 },
            r#"<arc curvature="0.05"/>"#,
        ),
        (
            CurveKind::Spiral {
                curv_start: 0.05,
                curv_end: -0.02,
            },
            r#"<spiral curvStart="0.05" curvEnd="-0.02"/>"#,
        ),
    ] {
        let (start, heading) = segments.last().unwrap().end();
        segments.push(CurveSegment {
            start,
            heading,
            length: 12.0,
            kind,
        });
        shapes.push(shape.to_string());
    }

    let mut plan_view = String::new();
    let mut s = 0.0;
    for (segment, shape) in segments.iter().zip(&shapes) {
        plan_view.push_str(&geometry_xml(s, segment, shape));
        s += segment.length;
    }

    let widening = r#"<lane id="-2" type="sidewalk" level="false">
    <width sOffset="0" a="1.5" b="0.02" c="0" d="0"/>
    <width sOffset="14" a="1.78" b="0" c="0" d="0"/>
</lane>"#;
    let sections = format!(
        r#"<laneOffset s="0" a="0.5" b="0" c="0" d="0"/>{}{}"#,
        section(
            0.0,
            &lane(1, "driving", 3.0, ""),
            &format!("{}{}", lane(-1, "driving", 3.5, ""), widening)
        ),
        section(
            20.0,
            &lane(1, "driving", 3.0, ""),
            &format!(
                "{}{}",
                lane(-1, "driving", 3.5, ""),
                lane(-2, "sidewalk", 1.78, "")
            )
        )
    );
    document(&road(7, -1, "", &plan_view, &sections))
}

#[test]
fn vertices_follow_the_parametric_lanes() {
    let opts = Options {
        elevation: false,
        ..options()
    };
    let doc = OpenDrive::parse(&winding_road()).unwrap();
    let mut timer = Timer::throwaway();
    let mut parametric = ParametricNetwork::from_opendrive(&doc, &opts, &mut timer).unwrap();
    let network = parametric
        .export_discrete_network(&opts, &mut timer)
        .unwrap();
    assert_eq!(network.len(), 6);

    let geometry = &parametric.roads[0];
    for lane in network.lanes() {
        for (pt, s) in lane.center_vertices.iter().zip(&lane.s_params) {
            let expected = geometry.lane_center(lane.id, *s).unwrap().unwrap();
            assert!(
                pt.to_2d().dist_to(expected) < 1e-6,
                "{} at s={}: {:?} vs {:?}",
                lane.id,
                s,
                pt,
                expected
            );
        }
        for pair in lane.s_params.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }
}

#[test]
fn deterministic() {
    let xml = winding_road();
    let a = run(&xml, &options());
    let b = run(&xml, &options());
    assert!(a.network == b.network);
}

#[test]
fn parallel_matches_sequential() {
    let mut more = String::new();
    for id in 20..30 {
        more.push_str(&road(
            id,
            -1,
            "",
            &line(0.0, id as f64 * 10.0, 0.3, 25.0),
            &section(
                0.0,
                &lane(1, "driving", 3.0, ""),
                &lane(-1, "driving", 3.5, ""),
            ),
        ));
    }
    let xml = with_roads(&winding_road(), &more);
    let sequential = run(&xml, &options());
    let parallel = run(
        &xml,
        &Options {
            parallel: true,
            ..options()
        },
    );
    assert_eq!(sequential.network.len(), 26);
    assert!(sequential.network == parallel.network);
}

#[test]
fn elevation_profile() {
    let xml = straight_road().replace(
        "<lanes>",
        r#"<elevationProfile><elevation s="0" a="2" b="0.1" c="0" d="0"/></elevationProfile><lanes>"#,
    );
    let result = run(&xml, &options());
    let lane = result.network.get(LaneKey::new(1, 0, -1)).unwrap();
    assert!(close(lane.center_vertices[0].z(), 2.0, 1e-9));
    assert!(close(lane.center_vertices[9].z(), 3.0, 1e-9));

    let flat = run(
        &xml,
        &Options {
            elevation: false,
            ..options()
        },
    );
    for lane in flat.network.lanes() {
        assert!(lane.center_vertices.iter().all(|pt| pt.z() == 0.0));
    }
}

#[test]
fn filter_lane_types() {
    let right = format!(
        "{}{}",
        lane(-1, "driving", 3.5, ""),
        lane(-2, "sidewalk", 2.0, "")
    );
    let xml = document(&road(
        1,
        -1,
        "",
        &line(0.0, 0.0, 0.0, 10.0),
        &section(0.0, &lane(1, "driving", 3.0, ""), &right),
    ));
    let mut types = BTreeSet::new();
    types.insert(LaneType::Driving);
    let result = run(
        &xml,
        &Options {
            filter_types: Some(types),
            ..options()
        },
    );
    assert_eq!(
        result.network.lane_ids(),
        vec![LaneKey::new(1, 0, -1), LaneKey::new(1, 0, 1)]
    );
    // The sidewalk is still placed outside the driving lane.
    assert!(result.bounds.min_y > -3.6);

    let all = run(&xml, &options());
    let sidewalk = all.network.get(LaneKey::new(1, 0, -2)).unwrap();
    assert!(close(sidewalk.center_vertices[0].y(), -4.5, 1e-9));
}

/// Road 2's only width record runs past the end of its reference line.
fn one_bad_road() -> String {
    let bad_lane = r#"<lane id="-1" type="driving" level="false">
    <width sOffset="0" a="3" b="0" c="0" d="0"/>
    <width sOffset="12" a="3" b="0" c="0" d="0"/>
</lane>"#;
    with_roads(
        &straight_road(),
        &road(
            2,
            -1,
            "",
            &line(0.0, 20.0, 0.0, 10.0),
            &section(0.0, "", bad_lane),
        ),
    )
}

#[test]
fn bad_roads_fail_the_conversion() {
    let doc = OpenDrive::parse(&one_bad_road()).unwrap();
    match convert(&doc, &options(), &mut Timer::throwaway()) {
        Err(Error::GeometryRange { road, .. }) => assert_eq!(road, 2),
        Err(err) => panic!("unexpected error {}", err),
        Ok(_) => panic!("road 2 should fail"),
    }
}

#[test]
fn skip_bad_roads() {
    let result = run(
        &one_bad_road(),
        &Options {
            skip_bad_roads: true,
            ..options()
        },
    );
    assert_eq!(result.skipped_roads.len(), 1);
    assert_eq!(result.skipped_roads[0].road, 2);
    assert!(result.network.lanes().all(|l| l.road() == 1));
    assert_eq!(result.network.len(), 2);
}

#[test]
fn sampling_distances_must_be_positive() {
    let doc = OpenDrive::parse(&straight_road()).unwrap();
    let bad = vec![
        ("cache_step", Options {
            cache_step: Some(0.0),
            ..options()
        }),
        ("precision", Options {
            precision: 0.0,
            ..options()
        }),
        ("precision", Options {
            precision: f64::NAN,
            ..options()
        }),
        ("precision", Options {
            precision: -1.0,
            ..options()
        }),
    ];
    for (expected, opts) in bad {
        match convert(&doc, &opts, &mut Timer::throwaway()) {
            Err(Error::InvalidOption { name, .. }) => assert_eq!(name, expected),
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("{} should be rejected", expected),
        }
    }

    // Turning the cache off entirely is fine
    let result = run(
        &straight_road(),
        &Options {
            cache_step: None,
            ..options()
        },
    );
    assert_eq!(result.network.len(), 2);
}

#[test]
fn document_errors_name_the_element() {
    let xml = straight_road().replace("<line/>", r#"<clothoid curvature="0.1"/>"#);
    let err = OpenDrive::parse(&xml).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("road[id=1]/planView/geometry"), "{}", msg);
    assert!(msg.contains("clothoid"), "{}", msg);
}
