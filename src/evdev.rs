// Linux input event device (evdev): find a touch panel and poll its absolute position.
//
// The node is opened non-blocking; `poll` reads at most one `struct input_event`
// and reports the current X/Y after applying it, the same way a touch controller
// keeps reporting the last known absolute axis values.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::mem::size_of;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::discovery::{first_match, list_candidates};
use crate::error::Error;
use crate::sys::{c_string, ior, ioctl_read};
use crate::types::{TouchPoint, TouchSource};

pub const DEV_INPUT_EVENT: &str = "/dev/input";
pub const EVENT_DEV_PREFIX: &str = "event";

const EV_ABS: u16 = 0x03;
const ABS_X: u16 = 0x00;
const ABS_Y: u16 = 0x01;
const EV_CNT: usize = 0x20;
const ABS_CNT: usize = 0x40;

const fn eviocgbit(ev: u16, len: usize) -> u64 {
    ior(b'E', 0x20 + ev as u64, len)
}

const fn eviocgabs(abs: u16) -> u64 {
    ior(b'E', 0x40 + abs as u64, size_of::<InputAbsinfo>())
}

const EVIOCGVERSION: u64 = ior(b'E', 0x01, size_of::<i32>());
const EVIOCGID: u64 = ior(b'E', 0x02, size_of::<InputId>());
const STRING_LEN: usize = 256;
const EVIOCGNAME: u64 = ior(b'E', 0x06, STRING_LEN);
const EVIOCGPHYS: u64 = ior(b'E', 0x07, STRING_LEN);
const EVIOCGUNIQ: u64 = ior(b'E', 0x08, STRING_LEN);

/// `struct input_id`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
struct InputId {
    bustype: u16,
    vendor: u16,
    product: u16,
    version: u16,
}

/// `struct input_absinfo`
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct InputAbsinfo {
    value: i32,
    minimum: i32,
    maximum: i32,
    fuzz: i32,
    flat: i32,
    resolution: i32,
}

/// Type, code and value of one `struct input_event` (the timestamp is dropped).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

/// Size of `struct input_event` on this target: a `timeval` plus 8 bytes.
pub const INPUT_EVENT_SIZE: usize = size_of::<libc::timeval>() + 8;

impl RawEvent {
    /// Decode one native-endian `struct input_event`.
    pub fn decode(buf: &[u8; INPUT_EVENT_SIZE]) -> Self {
        let t = size_of::<libc::timeval>();
        Self {
            kind: u16::from_ne_bytes([buf[t], buf[t + 1]]),
            code: u16::from_ne_bytes([buf[t + 2], buf[t + 3]]),
            value: i32::from_ne_bytes([buf[t + 4], buf[t + 5], buf[t + 6], buf[t + 7]]),
        }
    }
}

/// Last known absolute position, updated by `EV_ABS` X/Y events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AbsAxes {
    pub x: i32,
    pub y: i32,
}

impl AbsAxes {
    pub fn apply(&mut self, ev: &RawEvent) {
        if ev.kind != EV_ABS {
            return;
        }
        match ev.code {
            ABS_X => self.x = ev.value,
            ABS_Y => self.y = ev.value,
            _ => {}
        }
    }
}

#[inline]
fn test_bit(bits: &[u8], bit: usize) -> bool {
    bits.get(bit / 8).is_some_and(|b| b & (1 << (bit % 8)) != 0)
}

pub struct EventDevice {
    path: PathBuf,
    file: File,
    name: String,
    axes: AbsAxes,
}

impl EventDevice {
    /// Open an event node non-blocking and seed the current X/Y position.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| Error::DeviceOpen { path: path.to_path_buf(), source })?;

        // Anything that is not an evdev node fails here.
        let mut version = 0i32;
        ioctl_read(&file, path, EVIOCGVERSION, "EVIOCGVERSION", &mut version)?;

        let mut name = [0u8; STRING_LEN];
        let name = ioctl_read(&file, path, EVIOCGNAME, "EVIOCGNAME", &mut name)
            .map(|_| c_string(&name))
            .unwrap_or_default();

        let mut dev = Self {
            path: path.to_path_buf(),
            file,
            name,
            axes: AbsAxes::default(),
        };

        if dev.has_abs_xy() {
            dev.axes.x = dev.abs_value(ABS_X).unwrap_or(0);
            dev.axes.y = dev.abs_value(ABS_Y).unwrap_or(0);
        }

        Ok(dev)
    }

    /// Pick the first `event*` node in `dir` that reports absolute X and Y.
    pub fn discover(dir: &Path) -> Result<Self, Error> {
        let candidates = list_candidates(dir, EVENT_DEV_PREFIX)
            .map_err(|source| Error::DeviceOpen { path: dir.to_path_buf(), source })?;

        let found = first_match(candidates, |path| match Self::open(path) {
            Ok(dev) if dev.has_abs_xy() => Some(dev),
            Ok(dev) => {
                warn!("Skipping invalid touch UI device '{}' ({}).", path.display(), dev.name);
                None
            }
            Err(e) => {
                warn!("{e}");
                None
            }
        });

        found.map(|(_, dev)| dev).ok_or_else(|| Error::NoDevice {
            dir: dir.to_path_buf(),
            kind: "touch input",
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Supports `EV_ABS` with both `ABS_X` and `ABS_Y`.
    pub fn has_abs_xy(&self) -> bool {
        let mut types = [0u8; EV_CNT / 8];
        if ioctl_read(&self.file, &self.path, eviocgbit(0, types.len()), "EVIOCGBIT", &mut types).is_err() {
            return false;
        }
        if !test_bit(&types, EV_ABS as usize) {
            return false;
        }

        let mut codes = [0u8; ABS_CNT / 8];
        if ioctl_read(&self.file, &self.path, eviocgbit(EV_ABS, codes.len()), "EVIOCGBIT", &mut codes).is_err() {
            return false;
        }
        test_bit(&codes, ABS_X as usize) && test_bit(&codes, ABS_Y as usize)
    }

    fn abs_value(&self, code: u16) -> Option<i32> {
        let mut info = InputAbsinfo::default();
        ioctl_read(&self.file, &self.path, eviocgabs(code), "EVIOCGABS", &mut info).ok()?;
        Some(info.value)
    }

    fn string_query(&self, request: u64, name: &'static str) -> String {
        let mut buf = [0u8; STRING_LEN];
        match ioctl_read(&self.file, &self.path, request, name, &mut buf) {
            Ok(()) => c_string(&buf),
            Err(_) => "(null)".to_owned(),
        }
    }

    /// Read-only query whose failure only matters to the log.
    fn optional_query<T: Default>(&self, request: u64, name: &'static str) -> Option<T> {
        let mut out = T::default();
        match ioctl_read(&self.file, &self.path, request, name, &mut out) {
            Ok(()) => Some(out),
            Err(e) => {
                debug!("{e}");
                None
            }
        }
    }

    /// Log what was found, for the operator's records.
    pub fn describe(&self) {
        let id = self.optional_query::<InputId>(EVIOCGID, "EVIOCGID");
        let version = self.optional_query::<i32>(EVIOCGVERSION, "EVIOCGVERSION");

        info!("Found capable device at '{}'.", self.path.display());
        info!("Input device name: '{}'", self.name);
        info!("Input device ID: {}", id_text(id));
        info!("Evdev version: {}", version_text(version));
        info!("Phys location: {}", self.string_query(EVIOCGPHYS, "EVIOCGPHYS"));
        info!("Uniq identifier: {}", self.string_query(EVIOCGUNIQ, "EVIOCGUNIQ"));
    }

    fn read_event(&mut self) -> io::Result<Option<RawEvent>> {
        let mut buf = [0u8; INPUT_EVENT_SIZE];
        match self.file.read(&mut buf) {
            Ok(n) if n == buf.len() => Ok(Some(RawEvent::decode(&buf))),
            Ok(n) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, format!("short event read ({n} bytes)"))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn id_text(id: Option<InputId>) -> String {
    match id {
        Some(id) => format!("bus {:#x} vendor {:#x} product {:#x}", id.bustype, id.vendor, id.product),
        None => "(unknown)".to_owned(),
    }
}

fn version_text(version: Option<i32>) -> String {
    version.map_or_else(|| "(unknown)".to_owned(), |v| format!("{v:x}"))
}

impl TouchSource for EventDevice {
    fn poll(&mut self) -> Option<TouchPoint> {
        match self.read_event() {
            Ok(Some(ev)) => {
                self.axes.apply(&ev);
                Some(TouchPoint { x: self.axes.x, y: self.axes.y })
            }
            Ok(None) => None,
            Err(e) => {
                debug!("reading '{}': {e}", self.path.display());
                None
            }
        }
    }
}
