// Background pass: palette colour (optionally banded) inverted by the touch mask.
// Visual: a flat full-screen colour; wherever the mask is lit the colour flips,
// so touched cells stay visible on every background, even after it cycles.

use crate::banding::Banding;
use crate::color::PaletteCursor;
use crate::types::{Geometry, CHAN_A, CHAN_B, CHAN_G, CHAN_R};

/// Owns the background state that survives between passes.
#[derive(Clone, Debug, Default)]
pub struct Compositor {
    palette: PaletteCursor,
    banding: Banding,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index into the palette used by the next pass.
    pub fn palette_index(&self) -> usize {
        self.palette.index()
    }

    /// Render one full background into `dest`, XOR-ing in `mask`.
    /// Both buffers must be `geometry.len` bytes. When `advance` is set the
    /// palette moves on to the next colour after the pass.
    pub fn draw(&mut self, dest: &mut [u8], mask: &[u8], geometry: &Geometry, banding: bool, advance: bool) {
        debug_assert_eq!(dest.len(), geometry.len);
        debug_assert_eq!(mask.len(), geometry.len);

        let base = self.palette.color();
        let step = geometry.bytes_per_pixel.max(1) as usize;
        let len = geometry.len.min(dest.len()).min(mask.len());

        // Walk whole pixels only; a trailing partial pixel is left alone.
        let mut i = 0;
        while i + CHAN_A < len {
            let c = if banding {
                self.banding.apply(geometry.line_length, i, base)
            } else {
                base
            };

            dest[i + CHAN_R] = c.r ^ mask[i + CHAN_R];
            dest[i + CHAN_G] = c.g ^ mask[i + CHAN_G];
            dest[i + CHAN_B] = c.b ^ mask[i + CHAN_B];
            dest[i + CHAN_A] = 0x00;

            i += step;
        }

        if advance {
            self.palette.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PALETTE;

    fn small() -> Geometry {
        Geometry::packed(16, 4, 4)
    }

    #[test]
    fn zero_mask_yields_raw_palette_colour() {
        let g = small();
        let mut dest = vec![0xAAu8; g.len];
        let mask = vec![0u8; g.len];
        let mut comp = Compositor::new();

        comp.draw(&mut dest, &mask, &g, false, false);

        for px in dest.chunks_exact(4) {
            assert_eq!(px, &[0xFF, 0xFF, 0xFF, 0x00]);
        }
    }

    #[test]
    fn output_is_colour_xor_mask() {
        let g = small();
        let mut dest = vec![0u8; g.len];
        let mask: Vec<u8> = (0..g.len).map(|i| (i * 37) as u8).collect();
        let mut comp = Compositor::new();
        comp.draw(&mut dest, &mask, &g, false, true); // white pass, then advance
        comp.draw(&mut dest, &mask, &g, false, true); // black pass
        comp.draw(&mut dest, &mask, &g, false, false); // red pass

        let red = PALETTE[2];
        for (i, px) in dest.chunks_exact(4).enumerate() {
            let m = &mask[i * 4..i * 4 + 4];
            assert_eq!(px[CHAN_R], red.r ^ m[CHAN_R]);
            assert_eq!(px[CHAN_G], red.g ^ m[CHAN_G]);
            assert_eq!(px[CHAN_B], red.b ^ m[CHAN_B]);
            assert_eq!(px[CHAN_A], 0);
        }
    }

    #[test]
    fn palette_advances_once_per_pass_only_when_asked() {
        let g = small();
        let mut dest = vec![0u8; g.len];
        let mask = vec![0u8; g.len];
        let mut comp = Compositor::new();

        comp.draw(&mut dest, &mask, &g, false, false);
        assert_eq!(comp.palette_index(), 0);
        comp.draw(&mut dest, &mask, &g, false, true);
        assert_eq!(comp.palette_index(), 1);
        for _ in 0..4 {
            comp.draw(&mut dest, &mask, &g, false, true);
        }
        assert_eq!(comp.palette_index(), 0);
    }

    #[test]
    fn banded_pass_darkens_along_each_line() {
        // 510 px wide -> 2040 byte lines -> band width of 8 bytes (2 pixels)
        let g = Geometry::packed(510, 2, 4);
        let mut dest = vec![0u8; g.len];
        let mask = vec![0u8; g.len];
        let mut comp = Compositor::new();

        comp.draw(&mut dest, &mask, &g, true, false);

        for row in 0..2usize {
            for col in 0..510usize {
                let off = row * 2040 + col * 4;
                let want = 255 - (col * 4 / 8) as u8;
                assert_eq!(dest[off + CHAN_R], want, "row {row} col {col}");
                assert_eq!(dest[off + CHAN_A], 0);
            }
        }
    }

    #[test]
    fn banded_colour_is_inverted_by_the_mask() {
        let g = Geometry::packed(510, 2, 4);
        let mut dest = vec![0u8; g.len];
        let mask: Vec<u8> = (0..g.len).map(|i| (i * 13 + 7) as u8).collect();
        let mut comp = Compositor::new();

        comp.draw(&mut dest, &mask, &g, true, false);

        for row in 0..2usize {
            for col in 0..510usize {
                let off = row * 2040 + col * 4;
                let level = 255 - (col * 4 / 8) as u8;
                assert_eq!(dest[off + CHAN_R], level ^ mask[off + CHAN_R], "row {row} col {col}");
                assert_eq!(dest[off + CHAN_G], level ^ mask[off + CHAN_G], "row {row} col {col}");
                assert_eq!(dest[off + CHAN_B], level ^ mask[off + CHAN_B], "row {row} col {col}");
                assert_eq!(dest[off + CHAN_A], 0);
            }
        }
    }
}
