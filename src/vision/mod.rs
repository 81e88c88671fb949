//! Vision stages for the demo graph
//!
//! This module provides the processing behind the demo's four kernels:
//! - [`SyntheticCamera`]: a [`Capture`](crate::pipeline::Capture) device
//!   rendering moving shapes
//! - [`EdgeDetector`]: grayscale, 3x3 blur, gradient threshold
//! - [`ContourTracer`]: connected edge components drawn in distinct colors
//!
//! [`demo_map`] wires them into the graph the binary runs.

pub mod camera;
pub mod contours;
pub mod demo;
pub mod edges;
pub mod frame;

pub use camera::SyntheticCamera;
pub use contours::{Contour, ContourTracer};
pub use demo::demo_map;
pub use edges::EdgeDetector;
pub use frame::Frame;
