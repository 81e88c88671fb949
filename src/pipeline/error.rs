//! Pipeline-specific error types.
//!
//! Three families share one enum: construction-time errors raised while a
//! [`Map`](crate::pipeline::Map) is assembled or validated, protocol-misuse
//! errors raised by a kernel calling its ports out of order, and
//! [`PipelineError::PeerClosed`], which tells a producer its consumer is gone.
//! End-of-stream is never an error; `peek` reports it as `None`.

use crate::pipeline::id::KernelId;
use thiserror::Error;

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Kernel {kernel} error: {message}")]
    Kernel { kernel: KernelId, message: String },

    #[error("Unknown kernel {0}")]
    UnknownKernel(KernelId),

    #[error("Unknown {direction} port '{name}'")]
    UnknownPort {
        direction: &'static str,
        name: String,
    },

    #[error("Kernel '{kernel}' has {count} {direction} ports; name one explicitly")]
    AmbiguousPort {
        kernel: String,
        direction: &'static str,
        count: usize,
    },

    #[error("Kernel '{kernel}' has no {direction} ports")]
    MissingPort {
        kernel: String,
        direction: &'static str,
    },

    #[error("Port '{0}' requested twice")]
    DuplicatePort(String),

    #[error("Port '{name}' is not an {expected} port")]
    DirectionMismatch {
        name: String,
        expected: &'static str,
    },

    #[error("Port '{name}' carries {declared}, not {requested}")]
    PortTypeMismatch {
        name: String,
        declared: &'static str,
        requested: &'static str,
    },

    #[error("Port '{port}' on kernel '{kernel}' is already connected")]
    PortAlreadyConnected { kernel: String, port: String },

    #[error("Port '{port}' on kernel '{kernel}' is not connected")]
    UnconnectedPort { kernel: String, port: String },

    #[error("Kernel {0} cannot be linked to itself")]
    SelfLoop(KernelId),

    #[error("Link capacity must be between 1 and {}", crate::pipeline::buffer::MAX_LINK_CAPACITY)]
    InvalidCapacity,

    #[error("Cycle detected in pipeline graph")]
    CycleDetected,

    #[error("Pipeline graph is not connected: {reachable} of {total} kernels reachable")]
    DisconnectedGraph { reachable: usize, total: usize },

    #[error("Pipeline graph has no kernels")]
    EmptyGraph,

    #[error("Pipeline already started; the graph can no longer change")]
    AlreadyStarted,

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Failed to spawn kernel thread: {0}")]
    Spawn(String),

    #[error("recycle on '{0}' without an outstanding peek")]
    RecycleWithoutPeek(String),

    #[error("send on '{0}' without an outstanding allocate")]
    SendWithoutAllocate(String),

    #[error("allocate on '{0}' while the previous buffer is still unsent")]
    AllocateOutstanding(String),

    #[error("Consumer of port '{0}' has stopped")]
    PeerClosed(String),
}

impl PipelineError {
    /// Whether this error means the downstream side went away, which a
    /// producer treats as its own signal to stop rather than as a fault.
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, PipelineError::PeerClosed(_))
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::PortTypeMismatch {
            name: "0".to_string(),
            declared: "u32",
            requested: "f32",
        };
        assert_eq!(err.to_string(), "Port '0' carries u32, not f32");
    }

    #[test]
    fn test_kernel_error_names_kernel() {
        let err = PipelineError::Kernel {
            kernel: KernelId(4),
            message: "device lost".to_string(),
        };
        assert!(err.to_string().contains("KernelId(4)"));
        assert!(err.to_string().contains("device lost"));
    }

    #[test]
    fn test_peer_closed_classification() {
        assert!(PipelineError::PeerClosed("out".into()).is_peer_closed());
        assert!(!PipelineError::RecycleWithoutPeek("in".into()).is_peer_closed());
    }
}
