//! Interleaved 8-bit image buffer

/// An image with `channels` interleaved bytes per pixel.
///
/// The default frame is empty; links hand out default frames until storage
/// starts cycling, and [`Frame::reshape`] grows them in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    channels: usize,
    sequence: u64,
    data: Vec<u8>,
}

impl Frame {
    /// A zeroed frame
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            sequence: 0,
            data: vec![0; width * height * channels],
        }
    }

    /// Change the frame's shape, keeping the allocation. Pixel contents are
    /// unspecified afterwards.
    pub fn reshape(&mut self, width: usize, height: usize, channels: usize) {
        self.width = width;
        self.height = height;
        self.channels = channels;
        self.data.resize(width * height * channels, 0);
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Capture order of the frame this one was derived from
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn offset(&self, x: usize, y: usize) -> usize {
        (y * self.width + x) * self.channels
    }

    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let start = self.offset(x, y);
        &self.data[start..start + self.channels]
    }

    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [u8] {
        let start = self.offset(x, y);
        &mut self.data[start..start + self.channels]
    }

    /// Pixels with at least one nonzero channel
    pub fn lit_pixels(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.data
            .chunks_exact(self.channels)
            .filter(|px| px.iter().any(|&c| c != 0))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_keeps_allocation() {
        let mut frame = Frame::new(8, 8, 3);
        let capacity = frame.data.capacity();

        frame.reshape(4, 4, 1);
        assert_eq!(frame.data().len(), 16);
        assert_eq!(frame.data.capacity(), capacity);
    }

    #[test]
    fn test_pixel_access() {
        let mut frame = Frame::new(4, 3, 3);
        frame.pixel_mut(2, 1).copy_from_slice(&[1, 2, 3]);

        assert_eq!(frame.pixel(2, 1), &[1, 2, 3]);
        assert_eq!(frame.lit_pixels(), 1);
        frame.clear();
        assert_eq!(frame.lit_pixels(), 0);
    }

    #[test]
    fn test_default_is_empty() {
        let frame = Frame::default();
        assert!(frame.is_empty());
        assert_eq!(frame.lit_pixels(), 0);
    }
}
