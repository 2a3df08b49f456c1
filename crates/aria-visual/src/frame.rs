//! Output frames

use bytes::Bytes;

use aria_core::{Resolution, BYTES_PER_PIXEL};

/// One rendered RGB24 frame, row-major, top row first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Position in the session's frame sequence
    pub index: u64,
    pub data: Bytes,
}

impl Frame {
    pub fn new(resolution: Resolution, index: u64, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        debug_assert_eq!(data.len(), resolution.frame_bytes());
        Self {
            width: resolution.width,
            height: resolution.height,
            index,
            data,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// RGB triple at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Same image with red and blue swapped, for BGR consumers
    pub fn to_bgr(&self) -> Frame {
        let mut out = self.data.to_vec();
        for px in out.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.swap(0, 2);
        }
        Frame {
            width: self.width,
            height: self.height,
            index: self.index,
            data: Bytes::from(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_and_bgr() {
        let res = Resolution::new(2, 1);
        let frame = Frame::new(res, 3, vec![10u8, 20, 30, 40, 50, 60]);

        assert_eq!(frame.len(), res.frame_bytes());
        assert_eq!(frame.pixel(1, 0), Some([40, 50, 60]));
        assert_eq!(frame.pixel(2, 0), None);

        let bgr = frame.to_bgr();
        assert_eq!(bgr.index, 3);
        assert_eq!(&bgr.data[..], &[30, 20, 10, 60, 50, 40]);
        assert_eq!(bgr.to_bgr(), frame);
    }
}
