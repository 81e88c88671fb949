//! Built-in kernel implementations.
//!
//! Each wraps a collaborator (an iterator, a capture device, a closure or a
//! channel) behind the single-port lifecycle: sources allocate and send on
//! port `"0"`, sinks peek and recycle on port `"0"`, transforms do both.

pub mod sink;
pub mod source;
pub mod throughput;
pub mod transform;

pub use sink::{CollectSink, ForEachSink};
pub use source::{Capture, CaptureSource, IterSource};
pub use throughput::ThroughputMeter;
pub use transform::Transform;
