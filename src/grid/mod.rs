/// Grid device contract - geometry, LED frames and device events
use anyhow::{bail, Result};

mod memory;

pub use memory::{Display, MemorySurface};

/// Brightest level a grid LED accepts.
pub const MAX_LEVEL: u8 = 15;

/// Something that looks like a monome-style grid: a rectangle of
/// varibright LEDs that can be written and flushed to the hardware.
pub trait GridSurface: Send {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Write one LED into the pending frame buffer.
    fn set_led(&mut self, x: usize, y: usize, level: u8);

    /// Push the pending frame buffer to the device.
    fn flush(&mut self) -> Result<()>;

    /// Copy a whole frame into the buffer and flush it.
    fn present(&mut self, frame: &LedFrame) -> Result<()> {
        for y in 0..frame.height() {
            for x in 0..frame.width() {
                self.set_led(x, y, frame.get(x, y));
            }
        }
        self.flush()
    }
}

/// Events coming up from the device transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEvent {
    Connected,
    Disconnected,
    Key { x: usize, y: usize, pressed: bool },
}

/// Device size, fixed for the lifetime of the sequencer.
///
/// The bottom row is reserved for the trigger bar, everything above it
/// is playable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    width: usize,
    height: usize,
}

impl GridGeometry {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("grid geometry must be non-empty, got {width}x{height}");
        }
        Ok(Self { width, height })
    }

    pub fn of<S: GridSurface + ?Sized>(surface: &S) -> Result<Self> {
        Self::new(surface.width(), surface.height())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of playable lanes.
    pub fn rows(&self) -> usize {
        self.height - 1
    }

    /// Number of time steps.
    pub fn cols(&self) -> usize {
        self.width
    }

    pub fn bar_row(&self) -> usize {
        self.height - 1
    }
}

/// One full set of LED levels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedFrame {
    levels: Vec<u8>,
    width: usize,
    height: usize,
}

impl LedFrame {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            levels: vec![0; width * height],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.levels[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, level: u8) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.levels[y * self.width + x] = level.min(MAX_LEVEL);
    }

    pub fn row(&self, y: usize) -> &[u8] {
        if y >= self.height {
            return &[];
        }
        &self.levels[y * self.width..(y + 1) * self.width]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_reserves_bar_row() {
        let geometry = GridGeometry::new(16, 8).unwrap();
        assert_eq!(geometry.rows(), 7);
        assert_eq!(geometry.cols(), 16);
        assert_eq!(geometry.bar_row(), 7);
    }

    #[test]
    fn test_geometry_rejects_empty() {
        assert!(GridGeometry::new(0, 8).is_err());
        assert!(GridGeometry::new(8, 0).is_err());
    }

    #[test]
    fn test_frame_out_of_bounds_is_ignored() {
        let mut frame = LedFrame::new(4, 2);
        frame.set(4, 0, 9);
        frame.set(0, 2, 9);
        assert_eq!(frame, LedFrame::new(4, 2));
        assert_eq!(frame.get(10, 10), 0);
        assert!(frame.row(2).is_empty());
    }

    #[test]
    fn test_frame_caps_level() {
        let mut frame = LedFrame::new(2, 2);
        frame.set(1, 1, 40);
        assert_eq!(frame.get(1, 1), MAX_LEVEL);
        assert_eq!(frame.row(1), &[0, MAX_LEVEL]);
    }
}
