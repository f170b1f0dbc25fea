// Desktop preview: run the same test pattern in a window, with the mouse as the touch panel.
// Visual: the window shows exactly what the framebuffer would; holding the left
// button "touches" the cell under the cursor. ESC or closing the window stops the test.

use std::cell::RefCell;
use std::rc::Rc;

use minifb::{Key, MouseButton, MouseMode, Window, WindowOptions};

use crate::error::Error;
use crate::types::{Geometry, Surface, TouchPoint, TouchSource};

/// Window side of the preview: receives frames.
pub struct WindowSurface {
    window: Rc<RefCell<Window>>,
    geometry: Geometry,
    pixels: Vec<u32>, // each entry is 0x00RRGGBB for minifb
}

/// Mouse side of the preview: reports the cursor while the left button is held.
pub struct WindowTouch {
    window: Rc<RefCell<Window>>,
}

/// Open a window of `width` x `height` pixels.
/// Visual: a new black window appears with the given title.
pub fn open(title: &str, width: u32, height: u32) -> Result<(WindowSurface, WindowTouch), Error> {
    let window = Window::new(title, width as usize, height as usize, WindowOptions::default())
        .map_err(|e| Error::Window(e.to_string()))?;
    let window = Rc::new(RefCell::new(window));

    let geometry = Geometry::packed(width, height, 4);
    let surface = WindowSurface {
        window: Rc::clone(&window),
        geometry,
        pixels: vec![0u32; width as usize * height as usize],
    };
    Ok((surface, WindowTouch { window }))
}

impl WindowSurface {
    fn push(&mut self) -> Result<(), Error> {
        let (w, h) = (self.geometry.width as usize, self.geometry.height as usize);
        self.window
            .borrow_mut()
            .update_with_buffer(&self.pixels, w, h)
            .map_err(|e| Error::Window(e.to_string()))
    }
}

impl Surface for WindowSurface {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Visual: the window immediately displays the new frame.
    fn present(&mut self, frame: &[u8]) -> Result<(), Error> {
        // B, G, R, X bytes -> 0x00RRGGBB
        for (dst, px) in self.pixels.iter_mut().zip(frame.chunks_exact(4)) {
            *dst = u32::from_le_bytes([px[0], px[1], px[2], 0]);
        }
        self.push()
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.pixels.fill(0);
        self.push()
    }

    /// False once the window was closed or ESC is held.
    fn is_open(&self) -> bool {
        let window = self.window.borrow();
        window.is_open() && !window.is_key_down(Key::Escape)
    }
}

impl TouchSource for WindowTouch {
    fn poll(&mut self) -> Option<TouchPoint> {
        let window = self.window.borrow();
        if !window.get_mouse_down(MouseButton::Left) {
            return None;
        }
        window
            .get_mouse_pos(MouseMode::Clamp)
            .map(|(x, y)| TouchPoint { x: x.max(0.0) as i32, y: y.max(0.0) as i32 })
    }
}
