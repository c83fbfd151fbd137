use ndarray::ArrayView3;

/// Bytes per pixel; frames are always packed RGB24.
pub const CHANNELS: usize = 3;

/// A single video/image frame: contiguous RGB bytes in row-major order.
///
/// `index` is the frame's ordinal within its source and is what the sink
/// ordering guarantee is expressed in. Format conversion happens at I/O
/// boundaries only.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    /// A frame filled with a single color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], index: usize) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::new(data, width, height, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let o = self.offset(x, y);
        [self.data[o], self.data[o + 1], self.data[o + 2]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let o = self.offset(x, y);
        self.data[o..o + CHANNELS].copy_from_slice(&rgb);
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// `(height, width, channel)` view over the pixel data.
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12];
        let frame = Frame::new(data.clone(), 2, 2, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.size(), (2, 2));
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    fn test_filled_repeats_color() {
        let frame = Frame::filled(3, 2, [1, 2, 3], 0);
        assert_eq!(frame.data().len(), 18);
        assert_eq!(frame.pixel(2, 1), [1, 2, 3]);
    }

    #[test]
    fn test_set_pixel_round_trip() {
        let mut frame = Frame::filled(4, 4, [0, 0, 0], 0);
        frame.set_pixel(3, 2, [9, 8, 7]);
        assert_eq!(frame.pixel(3, 2), [9, 8, 7]);
        assert_eq!(frame.pixel(2, 3), [0, 0, 0]);
    }

    #[test]
    fn test_clone_is_independent() {
        let frame = Frame::filled(2, 2, [100, 100, 100], 0);
        let mut cloned = frame.clone();
        cloned.data_mut()[0] = 0;
        assert_eq!(frame.data()[0], 100);
        assert_eq!(cloned.data()[0], 0);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * 3")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 0);
    }

    #[test]
    fn test_as_ndarray_pixel_access() {
        let mut data = vec![0u8; 12];
        data[6] = 255; // row=1, col=0, R
        let frame = Frame::new(data, 2, 2, 0);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 2, 3]);
        assert_eq!(arr[[1, 0, 0]], 255);
        assert_eq!(arr[[1, 0, 1]], 0);
    }
}
