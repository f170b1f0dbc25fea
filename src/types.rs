// Core types shared by the compositor, the touch mask and the render loop.

use std::time::Instant;

use crate::error::Error;

/// Byte offsets of the colour channels inside one 32-bit XRGB pixel.
pub const CHAN_B: usize = 0;
pub const CHAN_G: usize = 1;
pub const CHAN_R: usize = 2;
pub const CHAN_A: usize = 3;

/// Shape of a display surface (and of every buffer that mirrors it).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,           // visible pixels along X
    pub height: u32,          // visible pixels along Y
    pub bytes_per_pixel: u32, // 4 for the XRGB layout we draw
    pub len: usize,           // total bytes of the surface memory
    pub line_length: u32,     // bytes per scanline (stride)
}

impl Geometry {
    /// Tightly packed geometry (stride == width * bpp), as used by the preview
    /// window and by tests.
    pub fn packed(width: u32, height: u32, bytes_per_pixel: u32) -> Self {
        let line_length = width * bytes_per_pixel;
        Self {
            width,
            height,
            bytes_per_pixel,
            len: line_length as usize * height as usize,
            line_length,
        }
    }
}

/// Test pattern cell size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellSize {
    pub width: u32,
    pub height: u32,
}

/// Latest absolute touch position reported by the input device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TouchPoint {
    pub x: i32,
    pub y: i32,
}

/// Somewhere finished frames end up: the mapped framebuffer or a preview window.
pub trait Surface {
    fn geometry(&self) -> Geometry;

    /// Copy a fully composited frame (exactly `geometry().len` bytes) to the screen.
    fn present(&mut self, frame: &[u8]) -> Result<(), Error>;

    /// Fill the whole surface with zeroes.
    fn clear(&mut self) -> Result<(), Error>;

    /// False once the surface went away (e.g. the preview window was closed).
    fn is_open(&self) -> bool {
        true
    }
}

/// Non-blocking source of absolute touch positions.
pub trait TouchSource {
    /// Consume at most one pending input event. `Some` carries the current
    /// absolute X/Y after that event; `None` means nothing was pending.
    fn poll(&mut self) -> Option<TouchPoint>;
}

/// Millisecond counter driving the frame cadence.
pub trait Clock {
    fn elapsed_ms(&self) -> u64;
}

/// Wall clock anchored at construction time.
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }
}

impl Clock for MonotonicClock {
    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
