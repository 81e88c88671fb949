//! Contour extraction and overlay
//!
//! A contour here is an 8-connected component of edge pixels. The overlay
//! paints each component in its own color on a black BGR frame.

use crate::vision::Frame;

/// One connected run of edge pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<(u32, u32)>,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(min_x, min_y, max_x, max_y)`, inclusive
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let (&(x, y), rest) = self.points.split_first()?;
        Some(rest.iter().fold((x, y, x, y), |(x0, y0, x1, y1), &(x, y)| {
            (x0.min(x), y0.min(y), x1.max(x), y1.max(y))
        }))
    }
}

/// Finds contours in edge maps, reusing its scratch space between frames.
#[derive(Debug, Clone, Default)]
pub struct ContourTracer {
    visited: Vec<bool>,
    stack: Vec<(u32, u32)>,
    contours: Vec<Contour>,
}

impl ContourTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contours from the most recent `trace`
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// Collect the 8-connected components of nonzero pixels in `edges`.
    pub fn trace(&mut self, edges: &Frame) -> &[Contour] {
        let (w, h) = (edges.width(), edges.height());
        self.contours.clear();
        self.visited.clear();
        self.visited.resize(w * h, false);

        let lit = |x: usize, y: usize| edges.pixel(x, y).iter().any(|&c| c != 0);

        for y in 0..h {
            for x in 0..w {
                if self.visited[y * w + x] || !lit(x, y) {
                    continue;
                }
                self.visited[y * w + x] = true;
                self.stack.push((x as u32, y as u32));
                let mut contour = Contour::default();

                while let Some((cx, cy)) = self.stack.pop() {
                    contour.points.push((cx, cy));
                    let (cx, cy) = (cx as usize, cy as usize);
                    for ny in cy.saturating_sub(1)..=(cy + 1).min(h - 1) {
                        for nx in cx.saturating_sub(1)..=(cx + 1).min(w - 1) {
                            let idx = ny * w + nx;
                            if !self.visited[idx] && lit(nx, ny) {
                                self.visited[idx] = true;
                                self.stack.push((nx as u32, ny as u32));
                            }
                        }
                    }
                }
                self.contours.push(contour);
            }
        }

        &self.contours
    }

    /// Paint the last traced contours onto a black `width` x `height` BGR frame.
    pub fn draw(&self, width: usize, height: usize, out: &mut Frame) {
        out.reshape(width, height, 3);
        out.clear();
        for (index, contour) in self.contours.iter().enumerate() {
            let color = palette(index);
            for &(x, y) in &contour.points {
                out.pixel_mut(x as usize, y as usize).copy_from_slice(&color);
            }
        }
    }

    /// Trace `edges` and draw the result into `out`.
    pub fn overlay(&mut self, edges: &Frame, out: &mut Frame) {
        self.trace(edges);
        self.draw(edges.width(), edges.height(), out);
        out.set_sequence(edges.sequence());
    }
}

/// A stable, never-black color per contour index
fn palette(index: usize) -> [u8; 3] {
    let hash = (index as u32)
        .wrapping_add(1)
        .wrapping_mul(0x9E37_79B9)
        ^ 12345;
    let [b, g, r, _] = hash.to_le_bytes();
    [b | 0x40, g | 0x40, r | 0x40]
}
