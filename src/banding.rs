// Line banding on the background.
//
// A display that cannot show every colour properly (low bit depth, a broken
// data line to the panel) does not render smooth gradients; colours snap from
// one step to the next. This splits each scanline into 255 bands and darkens
// every band by one more step than the previous one, so such defects stand out.
//
// With a band width of 3 pixels on a 9 pixel line:
// | rgb rgb rgb | rgb-1 rgb-1 rgb-1 | rgb-2 rgb-2 rgb-2 |

use crate::color::{sat_add, Rgb};

/// Band level carried across calls of one composite pass (and across passes).
#[derive(Clone, Debug)]
pub struct Banding {
    level: u8,
}

impl Default for Banding {
    fn default() -> Self {
        // Starts "one below zero": the very first offset matches the band
        // boundary and bumps the level before the scanline reset clears it.
        Self { level: u8::MAX }
    }
}

impl Banding {
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Band the pixel at byte `offset` of a frame whose scanlines are
    /// `line_length` bytes long. Offsets must arrive in increasing order.
    pub fn apply(&mut self, line_length: u32, offset: usize, color: Rgb) -> Rgb {
        let line_length = line_length.max(1) as usize;
        let band_width = (line_length / u8::MAX as usize).max(1);

        // Order matters: the reset must win over the increment at the start of a line.
        if offset % band_width == 0 {
            self.level = sat_add(self.level, 1);
        }
        if offset % line_length == 0 {
            self.level = 0;
        }

        color.darken(self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PALETTE;

    #[test]
    fn level_steps_every_band_width_and_resets_per_line() {
        let line = 2040u32; // band width 8 bytes
        let mut banding = Banding::default();

        for offset in (0..line as usize * 3).step_by(4) {
            banding.apply(line, offset, PALETTE[0]);
            let expected = ((offset % line as usize) / 8) as u8;
            assert_eq!(banding.level(), expected, "offset {offset}");
        }
    }

    #[test]
    fn first_pixel_of_each_line_is_unbanded() {
        let white = PALETTE[0];
        let mut banding = Banding::default();
        for offset in (0..2040usize * 3).step_by(4) {
            let out = banding.apply(2040, offset, white);
            if offset % 2040 == 0 {
                assert_eq!(out, white, "offset {offset}");
            } else if offset % 2040 == 2036 {
                assert_eq!(out, white.darken(254));
            }
        }
    }

    #[test]
    fn output_is_palette_minus_level() {
        let mut banding = Banding::default();
        let red = PALETTE[2];
        let mut last = red;
        for offset in (0..2040usize).step_by(4) {
            last = banding.apply(2040, offset, red);
        }
        assert_eq!(last, Rgb::new(255 - 254, 0, 0));
    }

    #[test]
    fn short_lines_do_not_divide_by_zero() {
        let mut banding = Banding::default();
        let out = banding.apply(100, 4, PALETTE[0]);
        assert_eq!(out, PALETTE[0].darken(banding.level()));
    }
}
