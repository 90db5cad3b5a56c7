//! Grid cell and color types

use bitflags::bitflags;

/// Packed 32-bit RGBA color, laid out as `0xAABBGGRR`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgba(pub u32);

impl Rgba {
    pub const BLACK: Rgba = Rgba::from_rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::from_rgb(255, 255, 255);

    /// Opaque color from 8-bit channels
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba(0xFF00_0000 | ((b as u32) << 16) | ((g as u32) << 8) | r as u32)
    }

    pub const fn r(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub const fn g(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    pub const fn b(self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    pub const fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Convert to crossterm color
    pub fn to_crossterm(self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r(),
            g: self.g(),
            b: self.b(),
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CellFlags: u8 {
        /// Colors of the cell are inverted
        const INVERTED = 0b0000_0001;
        /// Cell ended a row that wrapped onto the next one
        const WRAPPED  = 0b0000_0010;
    }
}

/// A single character cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub codepoint: u32,
    pub fg: Rgba,
    pub bg: Rgba,
    pub flags: CellFlags,
}

impl Cell {
    /// Codepoint marking a cell that was never written or has been erased
    pub const EMPTY: u32 = u32::MAX;

    pub const fn new(codepoint: u32, fg: Rgba, bg: Rgba) -> Self {
        Self {
            codepoint,
            fg,
            bg,
            flags: CellFlags::empty(),
        }
    }

    pub const fn empty() -> Self {
        Self::new(Self::EMPTY, Rgba(0), Rgba(0))
    }

    pub fn with_flags(mut self, flags: CellFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.codepoint == Self::EMPTY
    }

    /// The cell's character, if it holds a valid one
    pub fn ch(&self) -> Option<char> {
        if self.is_empty() {
            None
        } else {
            char::from_u32(self.codepoint)
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_packing() {
        let c = Rgba::from_rgb(0x12, 0x34, 0x56);
        assert_eq!(c.0, 0xFF56_3412);
        assert_eq!((c.r(), c.g(), c.b(), c.a()), (0x12, 0x34, 0x56, 0xFF));
    }

    #[test]
    fn test_empty_cell() {
        let cell = Cell::default();
        assert!(cell.is_empty());
        assert_eq!(cell.codepoint, u32::MAX);
        assert_eq!(cell.ch(), None);

        let cell = Cell::new('x' as u32, Rgba::WHITE, Rgba::BLACK);
        assert_eq!(cell.ch(), Some('x'));
    }
}
