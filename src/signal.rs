// Ctrl-C handling: the handler only raises a flag the render loop checks once per pass.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// Raised on SIGINT; the render loop stops and cleans up at its next iteration.
pub static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_signo: libc::c_int) {
    STOP.store(true, Ordering::Relaxed);
}

/// Route SIGINT to [`STOP`].
pub fn install() -> io::Result<()> {
    // SAFETY: the handler is async-signal-safe (a single atomic store), and the
    // sigaction struct is fully initialised before it is handed to the kernel.
    unsafe {
        let mut act: libc::sigaction = std::mem::zeroed();
        act.sa_sigaction = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::sigemptyset(&mut act.sa_mask);

        if libc::sigaction(libc::SIGINT, &act, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
