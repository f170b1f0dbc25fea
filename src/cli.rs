// Command line surface. Bad touch sizes and fade speeds never fail the run:
// they fall back to defaults or get clamped, so a jig script with a typo still
// gets a usable test pattern.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::render::Settings;
use crate::touch::MAX_FADE;
use crate::types::CellSize;

pub const DEFAULT_CELL: CellSize = CellSize { width: 50, height: 40 };
pub const DEFAULT_FADE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "touch-display-test")]
#[command(version, about = "Touchscreen display acceptance test", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Exit once the touch test succeeded
    #[arg(short, long)]
    pub abort: bool,

    /// Force event device (e.g. /dev/input/event0)
    #[arg(short, long, value_name = "EV_DEV")]
    pub evdev: Option<PathBuf>,

    /// Force framebuffer device (e.g. /dev/fb0)
    #[arg(short, long, value_name = "FB_DEV", alias = "fb")]
    pub fbdev: Option<PathBuf>,

    /// Test pattern cell size, X[xY]
    #[arg(short, long = "touchsize", value_name = "X[xY]", value_parser = parse_cell_size, default_value = "50x40")]
    pub touch_size: CellSize,

    /// Touch fade-out speed (0-64)
    #[arg(short = 's', long = "fadespeed", value_name = "SPEED", value_parser = parse_fade, default_value_t = DEFAULT_FADE, allow_hyphen_values = true)]
    pub fade_speed: u8,

    /// Enable banding of the background
    #[arg(short, long)]
    pub banding: bool,

    /// Preview in a desktop window of the given size instead of a framebuffer
    #[cfg(feature = "window")]
    #[arg(long, value_name = "WxH", num_args = 0..=1, default_missing_value = "800x480", value_parser = parse_cell_size)]
    pub window: Option<CellSize>,

    /// Display program version and exit
    #[arg(short = 'v', long, action = ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,

    /// Framebuffer device node, when --fbdev is not given
    #[arg(value_name = "FB_DEV")]
    pub fb_positional: Option<PathBuf>,

    /// Event device node, when --evdev is not given
    #[arg(value_name = "EV_DEV")]
    pub ev_positional: Option<PathBuf>,
}

impl Cli {
    pub fn fb_path(&self) -> Option<&PathBuf> {
        self.fbdev.as_ref().or(self.fb_positional.as_ref())
    }

    pub fn ev_path(&self) -> Option<&PathBuf> {
        self.evdev.as_ref().or(self.ev_positional.as_ref())
    }

    pub fn settings(&self) -> Settings {
        Settings {
            cell: self.touch_size,
            fade: self.fade_speed,
            banding: self.banding,
            abort_on_success: self.abort,
        }
    }
}

/// C `atoi` reading: optional whitespace and sign, then leading digits.
/// 0 when there are none; saturates instead of overflowing.
fn atoi(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let magnitude = rest
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));

    if negative { -magnitude } else { magnitude }
}

/// Non-negative reading of `s`; negatives count as 0.
fn leading_number(s: &str) -> u32 {
    u32::try_from(atoi(s).max(0)).unwrap_or(u32::MAX)
}

/// `WxH`, or a single value used for both axes. Zero axes take the default.
pub fn parse_cell_size(s: &str) -> Result<CellSize, String> {
    let (w, h) = match s.split_once(['x', 'X']) {
        Some((w, h)) if !w.is_empty() && !h.is_empty() => (leading_number(w), leading_number(h)),
        _ => {
            let v = leading_number(s);
            (v, v)
        }
    };

    Ok(CellSize {
        width: if w == 0 { DEFAULT_CELL.width } else { w },
        height: if h == 0 { DEFAULT_CELL.height } else { h },
    })
}

/// Lenient fade speed: garbage reads as 0, anything above the maximum is clamped.
/// A negative speed wraps to a huge unsigned value, so it clamps to the maximum too.
pub fn parse_fade(s: &str) -> Result<u8, String> {
    let speed = atoi(s);
    if speed < 0 {
        return Ok(MAX_FADE);
    }
    Ok(speed.min(i64::from(MAX_FADE)) as u8)
}
