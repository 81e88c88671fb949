//! The demo graph: camera → edges → contours → display

use crate::config::RuntimeConfig;
use crate::pipeline::{CaptureSource, ForEachSink, Map, PipelineResult, Transform};
use crate::vision::{ContourTracer, EdgeDetector, Frame, SyntheticCamera};

/// Assemble the four-stage demo map. `display` receives every overlay frame.
pub fn demo_map<F>(config: &RuntimeConfig, display: F) -> PipelineResult<Map>
where
    F: FnMut(&Frame) + Send + 'static,
{
    let demo = &config.demo;
    let mut map = Map::with_config(config);

    let camera = SyntheticCamera::new(demo.width, demo.height, demo.frames);
    let source = map.add(CaptureSource::new(camera)?.with_name("Camera"));

    let mut detector = EdgeDetector::new(demo.edge_threshold);
    let edges = map.chain(
        source,
        Transform::new("Edges", move |frame: &Frame, out: &mut Frame| {
            detector.detect(frame, out)
        }),
    )?;

    let mut tracer = ContourTracer::new();
    let contours = map.chain(
        edges.dst(),
        Transform::new("Contours", move |edges: &Frame, out: &mut Frame| {
            tracer.overlay(edges, out)
        }),
    )?;

    map.chain(
        contours.dst(),
        ForEachSink::new("Display", display).with_meter(config.stats_interval),
    )?;

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineError;

    #[test]
    fn test_demo_map_shape() {
        let map = demo_map(&RuntimeConfig::default(), |_| {}).unwrap();
        let plan = map.plan().unwrap();

        assert_eq!(plan.order.len(), 4);
        assert_eq!(map.kernel_name(plan.sources[0]), Some("Camera"));
        assert_eq!(map.kernel_name(plan.sinks[0]), Some("Display"));
        assert!(map.edges().iter().all(|e| e.payload.ends_with("Frame")));
    }

    #[test]
    fn test_demo_map_requires_camera() {
        let mut config = RuntimeConfig::default();
        config.demo.width = 0;
        assert!(matches!(
            demo_map(&config, |_| {}),
            Err(PipelineError::ResourceUnavailable(_))
        ));
    }
}
