//! Kernel-based streaming dataflow runtime.
//!
//! Kernels are placed on a [`Map`] and linked port to port. Each link is a
//! bounded FIFO of reusable buffers. When the map runs, every kernel gets
//! its own thread and calls [`Kernel::run`] until it returns
//! [`KernelStatus::Stop`].
//!
//! # Architecture
//!
//! ```text
//! [CaptureSource] ──► [Transform] ──► [Transform] ──► [ForEachSink]
//!        allocate/send      peek/recycle, allocate/send      peek/recycle
//! ```
//!
//! # Design
//!
//! - **Credit-bounded links**: a link holds at most `capacity` buffers that
//!   have been sent but not yet recycled; a full link blocks `send`.
//! - **Storage reuse**: recycled buffers flow back to the producer and come
//!   out of the next `allocate`.
//! - **End-of-stream by closure**: a stopped kernel drops its ports;
//!   consumers drain what is queued and then see `None` from `peek`.
//! - **Validated before run**: unconnected ports, type mismatches, cycles
//!   and disconnected graphs are rejected before any thread starts.

pub mod buffer;
pub mod error;
pub mod id;
pub mod kernel;
pub mod kernels;
pub mod map;
pub mod plan;
pub mod port;
pub mod scheduler;
pub mod topology;

pub use buffer::{LinkTraffic, Payload, MAX_LINK_CAPACITY};
pub use error::{PipelineError, PipelineResult};
pub use id::{EdgeId, KernelId};
pub use kernel::{Kernel, KernelContext, KernelStatus};
pub use kernels::{
    Capture, CaptureSource, CollectSink, ForEachSink, IterSource, ThroughputMeter, Transform,
};
pub use map::{Edge, Link, Map, PortRef};
pub use plan::{ExecutionPlan, PlanStats};
pub use port::{
    InputBuffer, InputPort, Inputs, OutputBuffer, OutputPort, Outputs, PortDescriptor,
    PortDirection, DEFAULT_PORT,
};
pub use scheduler::{KernelOutcome, KernelReport, LinkReport, RunReport, RunningMap};
pub use topology::{EdgeSnapshot, KernelSnapshot, TopologySnapshot};
