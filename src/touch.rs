// Touch mask: where the panel was touched recently, and how fast that fades.
// Visual: each touch lights a whole test cell in the mask (which inverts the
// background there); every frame the mask dims a little until the cell is gone.

use crate::color::sat_sub;
use crate::coverage::Coverage;
use crate::types::{CellSize, Geometry, TouchPoint, CHAN_A, CHAN_B, CHAN_G, CHAN_R};

/// Gap in pixels left between neighbouring cells so the grid stays readable.
pub const TEST_PATTERN_BORDER: u32 = 1;

/// Largest accepted fade speed.
pub const MAX_FADE: u8 = 64;

/// Round `value` down to a multiple of `cell` (a zero cell counts as 1).
#[inline]
pub fn clamp_to_cell(value: u32, cell: u32) -> u32 {
    (value / cell.max(1)) * cell
}

/// Paint the cell containing `point` into `mask` and record it in `coverage`.
///
/// Returns the coverage index that was marked, if the point lies on the grid.
/// Pixels past the end of the buffer are skipped silently; negative
/// coordinates are ignored altogether.
pub fn paint(mask: &mut [u8], coverage: &mut Coverage, geometry: &Geometry, point: TouchPoint, cell: CellSize) -> Option<usize> {
    let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
        log::trace!("ignoring touch at negative position {point:?}");
        return None;
    };

    // 1) Snap to the top-left corner of the cell that was hit.
    let x = clamp_to_cell(x, cell.width);
    let y = clamp_to_cell(y, cell.height);

    // 2) Remember the hit for the coverage check.
    let index = coverage.index_of(x / cell.width.max(1), y / cell.height.max(1));
    if let Some(index) = index {
        coverage.mark(index);
    }

    // 3) Light the cell, minus the border, in the mask.
    let w = cell.width.saturating_sub(TEST_PATTERN_BORDER) as u64;
    let h = cell.height.saturating_sub(TEST_PATTERN_BORDER) as u64;
    let bpp = geometry.bytes_per_pixel as u64;
    let stride = geometry.line_length as u64;
    let len = mask.len() as u64;

    for row in y as u64..y as u64 + h {
        for col in x as u64..x as u64 + w {
            let coord = col * bpp + row * stride;
            if coord + CHAN_A as u64 >= len {
                break;
            }
            let coord = coord as usize;

            mask[coord + CHAN_R] = u8::MAX;
            mask[coord + CHAN_G] = u8::MAX;
            mask[coord + CHAN_B] = u8::MAX;
            mask[coord + CHAN_A] = 0x00;
        }
    }

    index
}

/// Fade every byte of the mask towards zero by `speed`.
pub fn decay(mask: &mut [u8], speed: u8) {
    for b in mask.iter_mut() {
        *b = sat_sub(*b, speed);
    }
}
