//! KernelFlow demo - Main Entry Point
//!
//! Runs the fixed vision graph: a synthetic camera feeding edge detection,
//! contour overlay and a headless display sink that samples throughput.

use anyhow::Context;
use kernelflow_rs::{
    config::{config_path_from_env, RuntimeConfig},
    pipeline::KernelOutcome,
    vision::{demo_map, Frame},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kernelflow_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting KernelFlow demo");

    let config = match config_path_from_env() {
        Some(path) => {
            tracing::info!("Loading config from {:?}", path);
            RuntimeConfig::load(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => RuntimeConfig::default(),
    };
    config.validate().context("Invalid runtime config")?;

    let mut map = demo_map(&config, display).context("Failed to build the demo graph")?;

    let topology = map.topology().to_json()?;
    tracing::debug!("Topology:\n{}", topology);

    let report = map.exe().context("Failed to start the demo graph")?;

    for kernel in &report.kernels {
        match &kernel.outcome {
            KernelOutcome::Stopped => tracing::info!(
                "{} '{}': {} invocations in {:?}",
                kernel.id,
                kernel.name,
                kernel.invocations,
                kernel.elapsed
            ),
            outcome => tracing::error!("{} '{}' ended with {:?}", kernel.id, kernel.name, outcome),
        }
    }

    if !report.is_clean() {
        anyhow::bail!(
            "{} kernel(s) did not stop cleanly",
            report.failures().count()
        );
    }

    tracing::info!("Done in {:?}", report.elapsed);
    Ok(())
}

/// Stands in for a window: logs each overlay frame.
fn display(frame: &Frame) {
    tracing::trace!(
        "Frame {}: {}x{}, {} contour pixels",
        frame.sequence(),
        frame.width(),
        frame.height(),
        frame.lit_pixels()
    );
}
