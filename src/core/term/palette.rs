//! The fixed 256-color palette
//!
//! - 0..=15: standard and bright VGA colors
//! - 16..=231: 6x6x6 color cube, index `16 + 36r + 6g + b`
//! - 232..=255: 24-step grayscale ramp from 8 to 238

use super::cell::Rgba;

const STANDARD: [(u8, u8, u8); 16] = [
    (0x00, 0x00, 0x00),
    (0xAA, 0x00, 0x00),
    (0x00, 0xAA, 0x00),
    (0xAA, 0x55, 0x00),
    (0x00, 0x00, 0xAA),
    (0xAA, 0x00, 0xAA),
    (0x00, 0xAA, 0xAA),
    (0xAA, 0xAA, 0xAA),
    (0x55, 0x55, 0x55),
    (0xFF, 0x55, 0x55),
    (0x55, 0xFF, 0x55),
    (0xFF, 0xFF, 0x55),
    (0x55, 0x55, 0xFF),
    (0xFF, 0x55, 0xFF),
    (0x55, 0xFF, 0xFF),
    (0xFF, 0xFF, 0xFF),
];

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// Index of the default foreground (white)
pub const DEFAULT_FG: u8 = 15;
/// Index of the default background (black)
pub const DEFAULT_BG: u8 = 0;

pub static PALETTE: [Rgba; 256] = build();

const fn build() -> [Rgba; 256] {
    let mut table = [Rgba(0); 256];

    let mut i = 0;
    while i < 16 {
        let (r, g, b) = STANDARD[i];
        table[i] = Rgba::from_rgb(r, g, b);
        i += 1;
    }

    let mut i = 0;
    while i < 216 {
        let r = CUBE_LEVELS[i / 36];
        let g = CUBE_LEVELS[(i / 6) % 6];
        let b = CUBE_LEVELS[i % 6];
        table[16 + i] = Rgba::from_rgb(r, g, b);
        i += 1;
    }

    let mut i = 0;
    while i < 24 {
        let level = 8 + 10 * i as u8;
        table[232 + i] = Rgba::from_rgb(level, level, level);
        i += 1;
    }

    table
}

/// Look up a palette entry
pub fn color(index: u8) -> Rgba {
    PALETTE[index as usize]
}
