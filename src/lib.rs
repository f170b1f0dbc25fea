//! Touchscreen display acceptance test.
//!
//! Renders a cycling full-screen test pattern to a Linux framebuffer and
//! inverts every test cell the operator touches, so both the panel and the
//! touch controller can be checked in one pass. A coverage grid records which
//! cells were hit and reports once the whole surface has responded.

pub mod banding;
pub mod cli;
pub mod color;
pub mod compositor;
pub mod coverage;
pub mod discovery;
pub mod error;
pub mod evdev;
pub mod fbdev;
pub mod render;
pub mod signal;
mod sys;
pub mod touch;
pub mod types;
#[cfg(feature = "window")]
pub mod window;

pub use error::Error;
