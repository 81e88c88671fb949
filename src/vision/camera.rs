//! Synthetic capture device

use crate::pipeline::Capture;
use crate::vision::Frame;

const BACKGROUND: [u8; 3] = [24, 24, 24];
const SQUARE: [u8; 3] = [40, 200, 240];
const DISC: [u8; 3] = [230, 90, 60];

/// Renders a square sliding right and a disc bouncing vertically, in BGR.
pub struct SyntheticCamera {
    width: usize,
    height: usize,
    frames: u64,
    produced: u64,
}

impl SyntheticCamera {
    /// A camera that yields `frames` frames, then reports exhaustion.
    pub fn new(width: usize, height: usize, frames: u64) -> Self {
        Self {
            width,
            height,
            frames,
            produced: 0,
        }
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    fn render(&self, frame: &mut Frame, t: u64) {
        let (w, h) = (self.width, self.height);
        frame.reshape(w, h, 3);
        for px in frame.data_mut().chunks_exact_mut(3) {
            px.copy_from_slice(&BACKGROUND);
        }

        let side = (w.min(h) / 4).max(1);
        let sx = (t as usize * 3) % (w - side).max(1);
        let sy = h / 4;
        for y in sy..(sy + side).min(h) {
            for x in sx..(sx + side).min(w) {
                frame.pixel_mut(x, y).copy_from_slice(&SQUARE);
            }
        }

        let radius = (w.min(h) / 8).max(1) as i64;
        let span = (h as i64 - 2 * radius).max(1);
        let phase = (t as i64 * 2) % (2 * span);
        let cy = radius + if phase < span { phase } else { 2 * span - phase };
        let cx = (w * 3 / 4) as i64;
        for y in 0..h {
            for x in 0..w {
                let (dx, dy) = (x as i64 - cx, y as i64 - cy);
                if dx * dx + dy * dy <= radius * radius {
                    frame.pixel_mut(x, y).copy_from_slice(&DISC);
                }
            }
        }
    }
}

impl Capture<Frame> for SyntheticCamera {
    fn is_open(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    fn read(&mut self, frame: &mut Frame) -> bool {
        if self.produced >= self.frames {
            return false;
        }
        self.render(frame, self.produced);
        frame.set_sequence(self.produced);
        self.produced += 1;
        true
    }
}
