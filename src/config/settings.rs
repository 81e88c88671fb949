//! Settings for the demo vision graph
//!
//! The binary runs a fixed four-stage graph: a synthetic camera, an edge
//! detector, a contour overlay, and a display sink. These settings size the
//! frames and bound the run.

use crate::error::{KernelFlowError, Result};
use serde::{Deserialize, Serialize};

/// Demo graph settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Frame width in pixels
    #[serde(default = "default_width")]
    pub width: usize,

    /// Frame height in pixels
    #[serde(default = "default_height")]
    pub height: usize,

    /// Frames the camera produces before it reports exhaustion
    #[serde(default = "default_frames")]
    pub frames: u64,

    /// Gradient magnitude at or above which a pixel counts as an edge
    #[serde(default = "default_edge_threshold")]
    pub edge_threshold: u16,
}

fn default_width() -> usize {
    320
}

fn default_height() -> usize {
    240
}

fn default_frames() -> u64 {
    600
}

fn default_edge_threshold() -> u16 {
    96
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            frames: default_frames(),
            edge_threshold: default_edge_threshold(),
        }
    }
}

impl DemoConfig {
    pub fn validate(&self) -> Result<()> {
        // The edge kernel needs a full 3x3 neighborhood.
        if self.width < 3 || self.height < 3 {
            return Err(KernelFlowError::Config(format!(
                "demo frame must be at least 3x3, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Bytes in one grayscale frame
    pub fn frame_len(&self) -> usize {
        self.width * self.height
    }
}
