// Every failure the tool can report. Each variant states *where* things went wrong
// so the operator sees the device path next to the OS error.
use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Opening a device node failed (missing node, permissions, ...).
    #[error("unable to open '{}': {source}", path.display())]
    DeviceOpen { path: PathBuf, source: io::Error },

    /// An ioctl on an already open device failed.
    #[error("{request} failed on '{}': {source}", path.display())]
    DeviceQuery {
        path: PathBuf,
        request: &'static str,
        source: io::Error,
    },

    /// Mapping the framebuffer memory failed.
    #[error("failed to map framebuffer '{}': {source}", path.display())]
    Map { path: PathBuf, source: io::Error },

    /// Autodiscovery found no device passing the capability filter.
    #[error("no capable {kind} device found in '{}'", dir.display())]
    NoDevice { dir: PathBuf, kind: &'static str },

    /// Backbuffer or touch mask could not be allocated.
    #[error("out of memory allocating {bytes} bytes for frame buffers")]
    Allocation { bytes: usize },

    /// Creating or updating the preview window failed.
    #[cfg(feature = "window")]
    #[error("window error: {0}")]
    Window(String),
}
