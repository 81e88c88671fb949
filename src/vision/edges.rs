//! Edge detection
//!
//! Grayscale conversion, a 3x3 box blur, then a Sobel gradient whose L1
//! magnitude is thresholded into a binary edge map.

use crate::vision::Frame;

/// Output value for edge pixels
pub const EDGE: u8 = 255;

/// Reusable edge detector. Scratch planes are kept between frames.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    threshold: u16,
    gray: Vec<u8>,
    blurred: Vec<u8>,
}

impl EdgeDetector {
    pub fn new(threshold: u16) -> Self {
        Self {
            threshold,
            gray: Vec::new(),
            blurred: Vec::new(),
        }
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    /// Write the single-channel edge map of `input` into `out`.
    pub fn detect(&mut self, input: &Frame, out: &mut Frame) {
        let (w, h) = (input.width(), input.height());
        out.reshape(w, h, 1);
        out.set_sequence(input.sequence());
        out.clear();
        if w < 3 || h < 3 || input.channels() == 0 {
            return;
        }

        to_gray(input, &mut self.gray);
        box_blur(&self.gray, w, h, &mut self.blurred);

        let src = &self.blurred;
        let at = |x: usize, y: usize| src[y * w + x] as i32;
        let threshold = self.threshold as i32;
        let dst = out.data_mut();
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let gx = at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1)
                    - at(x - 1, y - 1)
                    - 2 * at(x - 1, y)
                    - at(x - 1, y + 1);
                let gy = at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1)
                    - at(x - 1, y - 1)
                    - 2 * at(x, y - 1)
                    - at(x + 1, y - 1);
                if gx.abs() + gy.abs() >= threshold {
                    dst[y * w + x] = EDGE;
                }
            }
        }
    }
}

/// BGR or single-channel to luma
fn to_gray(input: &Frame, gray: &mut Vec<u8>) {
    gray.clear();
    match input.channels() {
        1 => gray.extend_from_slice(input.data()),
        c => gray.extend(input.data().chunks_exact(c).map(|px| {
            let (b, g, r) = (px[0] as u32, px[1 % c] as u32, px[2 % c] as u32);
            ((29 * b + 150 * g + 77 * r) >> 8) as u8
        })),
    }
}

/// 3x3 mean with clamped borders
fn box_blur(src: &[u8], w: usize, h: usize, dst: &mut Vec<u8>) {
    dst.clear();
    dst.resize(w * h, 0);
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0u32;
            for dy in [-1i64, 0, 1] {
                for dx in [-1i64, 0, 1] {
                    let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as usize;
                    let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as usize;
                    sum += src[sy * w + sx] as u32;
                }
            }
            dst[y * w + x] = (sum / 9) as u8;
        }
    }
}
