// Thin helpers around raw Linux ioctls shared by the framebuffer and evdev code.

use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;

use crate::error::Error;

const IOC_NRSHIFT: u64 = 0;
const IOC_TYPESHIFT: u64 = 8;
const IOC_SIZESHIFT: u64 = 16;
const IOC_DIRSHIFT: u64 = 30;
const IOC_READ: u64 = 2;

/// `_IOC(_IOC_READ, ty, nr, size)` from `<asm-generic/ioctl.h>`.
pub const fn ior(ty: u8, nr: u64, size: usize) -> u64 {
    (IOC_READ << IOC_DIRSHIFT) | ((ty as u64) << IOC_TYPESHIFT) | (nr << IOC_NRSHIFT) | ((size as u64) << IOC_SIZESHIFT)
}

/// Issue a read-style ioctl that fills `out`.
///
/// `out` must be the exact type (or buffer size) the kernel expects for `request`.
pub fn ioctl_read<T>(file: &File, path: &Path, request: u64, name: &'static str, out: &mut T) -> Result<(), Error> {
    // SAFETY: `out` is a valid, exclusively borrowed destination sized for `request`.
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), request as _, out as *mut T) };
    if ret < 0 {
        return Err(Error::DeviceQuery {
            path: path.to_path_buf(),
            request: name,
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// NUL-terminated C string buffer to an owned string.
pub fn c_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
