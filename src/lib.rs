//! # KernelFlow-RS: streaming dataflow kernels
//!
//! A runtime for pipelines of independent stages ("kernels") that exchange
//! typed buffers over bounded links. Every kernel runs on its own thread;
//! backpressure and end-of-stream travel through the links themselves.
//!
//! ## Architecture
//!
//! - **Pipeline**: ports, links, the `Map` graph and the thread-per-kernel scheduler
//! - **Config**: JSON runtime tuning (link capacity, thread names, demo sizes)
//! - **Vision**: the stages behind the demo binary's camera → edges → contours → display graph
//!
//! ## Example
//!
//! ```ignore
//! use kernelflow_rs::pipeline::{CollectSink, IterSource, Map, Transform};
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let mut map = Map::new();
//! let src = map.add(IterSource::new("Numbers", 0u32..10));
//! let inc = map.chain(src, Transform::new("Inc", |n: &u32, out: &mut u32| *out = n + 1))?;
//! map.chain(inc.dst(), CollectSink::new(tx))?;
//!
//! let report = map.exe()?;
//! assert!(report.is_clean());
//! assert_eq!(rx.try_iter().collect::<Vec<_>>(), (1..=10).collect::<Vec<_>>());
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod vision;

// Re-export commonly used types
pub use config::{DemoConfig, RuntimeConfig};
pub use error::{KernelFlowError, Result, ResultExt};
pub use pipeline::{Kernel, KernelContext, KernelStatus, Map, PipelineError, RunReport};
