//! Integration tests for the demo vision graph

mod common;

use common::run_to_completion;
use crossbeam_channel::unbounded;
use kernelflow_rs::config::{DemoConfig, RuntimeConfig};
use kernelflow_rs::vision::demo_map;

fn small_config(frames: u64) -> RuntimeConfig {
    RuntimeConfig {
        default_capacity: 2,
        stats_interval: 4,
        demo: DemoConfig {
            width: 48,
            height: 36,
            frames,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_demo_graph_displays_every_frame() {
    let (tx, rx) = unbounded();
    let mut map = demo_map(&small_config(10), move |frame| {
        let _ = tx.send((frame.sequence(), frame.channels(), frame.lit_pixels()));
    })
    .unwrap();

    let report = run_to_completion(&mut map);
    assert!(report.is_clean(), "{:?}", report);

    let frames: Vec<_> = rx.try_iter().collect();
    assert_eq!(frames.len(), 10);
    for (expected, (sequence, channels, lit)) in frames.into_iter().enumerate() {
        assert_eq!(sequence, expected as u64);
        assert_eq!(channels, 3);
        // Both shapes produce outlines.
        assert!(lit > 0, "frame {} has no contours", sequence);
    }
}

#[test]
fn test_demo_graph_with_no_frames() {
    let (tx, rx) = unbounded::<u64>();
    let mut map = demo_map(&small_config(0), move |frame| {
        let _ = tx.send(frame.sequence());
    })
    .unwrap();

    let report = run_to_completion(&mut map);
    assert!(report.is_clean());
    assert_eq!(rx.try_iter().count(), 0);
    assert!(report.links.iter().all(|l| l.traffic.sent == 0));
}

#[test]
fn test_demo_topology_json() {
    let map = demo_map(&small_config(1), |_| {}).unwrap();
    let json: serde_json::Value = serde_json::from_str(&map.topology().to_json().unwrap()).unwrap();

    let names: Vec<&str> = json["kernels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Camera", "Edges", "Contours", "Display"]);
    assert_eq!(json["edges"].as_array().unwrap().len(), 3);
    assert_eq!(json["edges"][0]["capacity"], 2);
}
