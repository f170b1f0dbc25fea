// Channel math and the background palette.
// Visual: the five full-screen colours the test cycles through, and the
// clamped add/sub that keeps fades and bands from wrapping into garbage.

/// Saturated addition: never wraps past 255.
#[inline]
pub fn sat_add(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

/// Saturated subtraction: never wraps below 0.
#[inline]
pub fn sat_sub(a: u8, b: u8) -> u8 {
    a.saturating_sub(b)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Subtract the same amount from every channel, clamping at 0.
    #[inline]
    pub fn darken(self, by: u8) -> Self {
        Self {
            r: sat_sub(self.r, by),
            g: sat_sub(self.g, by),
            b: sat_sub(self.b, by),
        }
    }
}

/// Background colours in display order: white, black, red, green, blue.
pub const PALETTE: [Rgb; 5] = [
    Rgb::new(0xFF, 0xFF, 0xFF),
    Rgb::new(0x00, 0x00, 0x00),
    Rgb::new(0xFF, 0x00, 0x00),
    Rgb::new(0x00, 0xFF, 0x00),
    Rgb::new(0x00, 0x00, 0xFF),
];

/// Position inside [`PALETTE`]; wraps back to white after blue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaletteCursor {
    index: usize,
}

impl PaletteCursor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn color(&self) -> Rgb {
        PALETTE[self.index]
    }

    pub fn advance(&mut self) {
        self.index = (self.index + 1) % PALETTE.len();
    }
}
