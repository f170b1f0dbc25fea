// Linux framebuffer device: query its shape, map its memory, and present frames.
// Visual: whatever lands in the mapping is what the panel shows right away.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use log::{info, warn};
use memmap2::{MmapMut, MmapOptions};

use crate::discovery::{first_match, list_candidates};
use crate::error::Error;
use crate::sys::{c_string, ioctl_read};
use crate::types::{Geometry, Surface};

pub const DEV_FB: &str = "/dev";
pub const FB_DEV_PREFIX: &str = "fb";

pub const DISPLAY_MIN_XRES: u32 = 800;
pub const DISPLAY_MIN_YRES: u32 = 320;
pub const DISPLAY_BPP: u32 = 4;

const FBIOGET_VSCREENINFO: u64 = 0x4600;
const FBIOGET_FSCREENINFO: u64 = 0x4602;

#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct FbBitfield {
    offset: u32,
    length: u32,
    msb_right: u32,
}

/// `struct fb_var_screeninfo` from `<linux/fb.h>`.
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct FbVarScreeninfo {
    xres: u32,
    yres: u32,
    xres_virtual: u32,
    yres_virtual: u32,
    xoffset: u32,
    yoffset: u32,
    bits_per_pixel: u32,
    grayscale: u32,
    red: FbBitfield,
    green: FbBitfield,
    blue: FbBitfield,
    transp: FbBitfield,
    nonstd: u32,
    activate: u32,
    height: u32,
    width: u32,
    accel_flags: u32,
    pixclock: u32,
    left_margin: u32,
    right_margin: u32,
    upper_margin: u32,
    lower_margin: u32,
    hsync_len: u32,
    vsync_len: u32,
    sync: u32,
    vmode: u32,
    rotate: u32,
    colorspace: u32,
    reserved: [u32; 4],
}

/// `struct fb_fix_screeninfo` from `<linux/fb.h>`.
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct FbFixScreeninfo {
    id: [u8; 16],
    smem_start: libc::c_ulong,
    smem_len: u32,
    type_: u32,
    type_aux: u32,
    visual: u32,
    xpanstep: u16,
    ypanstep: u16,
    ywrapstep: u16,
    line_length: u32,
    mmio_start: libc::c_ulong,
    mmio_len: u32,
    accel: u32,
    capabilities: u16,
    reserved: [u16; 2],
}

/// An opened, not yet mapped, framebuffer node.
struct Probe {
    file: File,
    id: String,
    geometry: Geometry,
}

fn probe(path: &Path) -> Result<Probe, Error> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| Error::DeviceOpen { path: path.to_path_buf(), source })?;

    let mut var = FbVarScreeninfo::default();
    ioctl_read(&file, path, FBIOGET_VSCREENINFO, "FBIOGET_VSCREENINFO", &mut var)?;

    let mut fix = FbFixScreeninfo::default();
    ioctl_read(&file, path, FBIOGET_FSCREENINFO, "FBIOGET_FSCREENINFO", &mut fix)?;

    let id = match c_string(&fix.id) {
        id if id.is_empty() => "(null)".to_owned(),
        id => id,
    };

    Ok(Probe {
        file,
        id,
        geometry: Geometry {
            width: var.xres,
            height: var.yres,
            bytes_per_pixel: var.bits_per_pixel / 8,
            len: fix.smem_len as usize,
            line_length: fix.line_length,
        },
    })
}

/// Autodiscovery filter: big enough and exactly 32 bits per pixel.
pub fn is_capable(geometry: &Geometry) -> bool {
    geometry.width >= DISPLAY_MIN_XRES
        && geometry.height >= DISPLAY_MIN_YRES
        && geometry.bytes_per_pixel == DISPLAY_BPP
}

/// A mapped framebuffer. Dropping it unmaps the memory and closes the node.
pub struct Framebuffer {
    path: PathBuf,
    id: String,
    geometry: Geometry,
    map: MmapMut,
    _file: File,
}

impl Framebuffer {
    /// Open a specific framebuffer node, whatever its geometry.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let probe = probe(path)?;
        Self::map(path.to_path_buf(), probe)
    }

    /// Pick the first `fb*` node in `dir` that passes [`is_capable`].
    pub fn discover(dir: &Path) -> Result<Self, Error> {
        let candidates = list_candidates(dir, FB_DEV_PREFIX)
            .map_err(|source| Error::DeviceOpen { path: dir.to_path_buf(), source })?;

        let found = first_match(candidates, |path| match probe(path) {
            Ok(dev) if is_capable(&dev.geometry) => Some(dev),
            Ok(dev) => {
                warn!("Skipping invalid display device '{}' ({}).", path.display(), dev.id);
                None
            }
            Err(e) => {
                warn!("{e}");
                None
            }
        });

        let (path, probe) = found.ok_or_else(|| Error::NoDevice {
            dir: dir.to_path_buf(),
            kind: "framebuffer",
        })?;
        Self::map(path, probe)
    }

    fn map(path: PathBuf, probe: Probe) -> Result<Self, Error> {
        // SAFETY: the framebuffer memory is shared with the kernel only; this
        // process is its sole writer for as long as the mapping lives.
        let map = unsafe {
            MmapOptions::new()
                .len(probe.geometry.len)
                .map_mut(&probe.file)
        }
        .map_err(|source| Error::Map { path: path.clone(), source })?;

        let g = probe.geometry;
        info!("Found capable device at '{}'.", path.display());
        info!("Display device name: '{}'", probe.id);
        info!("Display resolution: '{} x {} @{}bpp'.", g.width, g.height, g.bytes_per_pixel * 8);

        Ok(Self {
            path,
            id: probe.id,
            geometry: g,
            map,
            _file: probe.file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Surface for Framebuffer {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn present(&mut self, frame: &[u8]) -> Result<(), Error> {
        let n = frame.len().min(self.map.len());
        self.map[..n].copy_from_slice(&frame[..n]);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.map.fill(0);
        Ok(())
    }
}
