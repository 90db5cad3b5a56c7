//! Terminal state management
//!
//! Couples the cell grid with the current drawing attributes ("pen") that
//! the interpreter applies to every written cell.

use super::cell::{Cell, CellFlags, Rgba};
use super::grid::{Grid, Point};
use super::palette;

/// Range selector shared by erase-in-display and erase-in-line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EraseMode {
    CursorToEnd,
    StartToCursor,
    All,
}

impl EraseMode {
    /// Map a `J`/`K` parameter
    pub fn from_param(param: u16) -> Option<Self> {
        match param {
            0 => Some(Self::CursorToEnd),
            1 => Some(Self::StartToCursor),
            2 => Some(Self::All),
            _ => None,
        }
    }
}

/// Current drawing attributes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pen {
    pub fg: Rgba,
    pub bg: Rgba,
    /// Parsed from SGR 1; has no effect on rendering
    pub bold: bool,
    /// Toggled by SGR 7; `fg` and `bg` are already swapped while set
    pub inverted: bool,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            fg: palette::color(palette::DEFAULT_FG),
            bg: palette::color(palette::DEFAULT_BG),
            bold: false,
            inverted: false,
        }
    }
}

/// Terminal state holding the grid and pen
pub struct TerminalState {
    pub grid: Grid,
    pub pen: Pen,
}

impl TerminalState {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_scrollback(cols, rows, 0)
    }

    pub fn with_scrollback(cols: u16, rows: u16, scrollback_limit: usize) -> Self {
        Self {
            grid: Grid::with_scrollback(cols, rows, scrollback_limit),
            pen: Pen::default(),
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.grid.resize(cols, rows);
    }

    /// Put a character at the cursor using the current pen
    pub fn put_char(&mut self, codepoint: u32) {
        let mut cell = Cell::new(codepoint, self.pen.fg, self.pen.bg);
        if self.pen.inverted {
            cell = cell.with_flags(CellFlags::INVERTED);
        }
        self.grid.put_cell_at_cursor(cell);
    }

    /// Carriage return followed by a row advance
    pub fn line_break(&mut self) {
        self.grid.carriage_return();
        self.grid.next_row();
    }

    pub fn carriage_return(&mut self) {
        self.grid.carriage_return();
    }

    /// Move one column left without erasing
    pub fn backspace(&mut self) {
        self.grid.move_cursor(-1, 0);
    }

    pub fn erase_display(&mut self, mode: EraseMode) {
        let (cols, rows) = self.grid.get_size();
        let cursor = self.grid.get_cursor();
        let last = Point::new(cols - 1, rows - 1);

        match mode {
            EraseMode::CursorToEnd => self.grid.erase_display(cursor, last),
            EraseMode::StartToCursor => self.grid.erase_display(Point::new(0, 0), cursor),
            EraseMode::All => self.grid.erase_display(Point::new(0, 0), last),
        }
    }

    pub fn erase_line(&mut self, mode: EraseMode) {
        let (cols, _) = self.grid.get_size();
        let cursor = self.grid.get_cursor();

        match mode {
            EraseMode::CursorToEnd => self.grid.erase_line(cursor.y, cursor.x, cols - 1),
            EraseMode::StartToCursor => self.grid.erase_line(cursor.y, 0, cursor.x),
            EraseMode::All => self.grid.erase_line(cursor.y, 0, cols - 1),
        }
    }

    pub fn reset_attributes(&mut self) {
        self.pen = Pen::default();
    }

    /// Home the cursor, clear the screen and reset the pen
    pub fn full_reset(&mut self) {
        self.grid.set_cursor(0, 0);
        self.erase_display(EraseMode::All);
        self.reset_attributes();
    }

    pub fn set_bold(&mut self, bold: bool) {
        self.pen.bold = bold;
    }

    pub fn invert_colors(&mut self) {
        std::mem::swap(&mut self.pen.fg, &mut self.pen.bg);
        self.pen.inverted = !self.pen.inverted;
    }

    pub fn set_fg_index(&mut self, index: u8) {
        self.pen.fg = palette::color(index);
    }

    pub fn set_bg_index(&mut self, index: u8) {
        self.pen.bg = palette::color(index);
    }

    pub fn set_fg(&mut self, color: Rgba) {
        self.pen.fg = color;
    }

    pub fn set_bg(&mut self, color: Rgba) {
        self.pen.bg = color;
    }

    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.grid.set_cursor_visible(visible);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_str(state: &mut TerminalState, s: &str) {
        for ch in s.chars() {
            state.put_char(ch as u32);
        }
    }

    fn row_text(state: &TerminalState, row: u16) -> String {
        let (cols, _) = state.grid.get_size();
        (0..cols)
            .map(|col| {
                state
                    .grid
                    .get_cell_at(row, col)
                    .and_then(|c| c.ch())
                    .unwrap_or(' ')
            })
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    #[test]
    fn test_put_char_uses_pen() {
        let mut state = TerminalState::new(10, 2);
        state.set_fg_index(2);
        state.set_bg(Rgba::from_rgb(1, 2, 3));
        state.put_char('z' as u32);

        let cell = state.grid.get_cell_at(0, 0).unwrap();
        assert_eq!(cell.fg, palette::color(2));
        assert_eq!(cell.bg, Rgba::from_rgb(1, 2, 3));
    }

    #[test]
    fn test_erase_line_modes() {
        let mut state = TerminalState::new(6, 1);
        write_str(&mut state, "abcde");
        state.grid.set_cursor(2, 0);

        state.erase_line(EraseMode::CursorToEnd);
        assert_eq!(row_text(&state, 0), "ab");

        write_str(&mut state, "cd");
        state.grid.set_cursor(1, 0);
        state.erase_line(EraseMode::StartToCursor);
        assert_eq!(row_text(&state, 0), "  cd");

        state.erase_line(EraseMode::All);
        assert_eq!(row_text(&state, 0), "");
    }

    #[test]
    fn test_erase_display_modes() {
        let mut state = TerminalState::new(3, 3);
        write_str(&mut state, "abcdefgh");
        state.grid.set_cursor(1, 1);

        state.erase_display(EraseMode::StartToCursor);
        assert_eq!(row_text(&state, 0), "");
        assert_eq!(row_text(&state, 1), "  f");
        assert_eq!(row_text(&state, 2), "gh");
        assert_eq!(state.grid.get_cursor(), Point::new(1, 1));
    }

    #[test]
    fn test_invert_and_reset() {
        let mut state = TerminalState::new(4, 1);
        state.set_bold(true);
        state.invert_colors();
        assert_eq!(state.pen.fg, Rgba::BLACK);
        assert_eq!(state.pen.bg, Rgba::WHITE);

        state.reset_attributes();
        assert_eq!(state.pen, Pen::default());
    }

    #[test]
    fn test_inverted_cells_are_flagged() {
        let mut state = TerminalState::new(4, 1);
        state.put_char('a' as u32);
        state.invert_colors();
        state.put_char('b' as u32);
        state.invert_colors();
        state.put_char('c' as u32);

        let flags = |col| state.grid.get_cell_at(0, col).unwrap().flags;
        assert!(!flags(0).contains(CellFlags::INVERTED));
        assert!(flags(1).contains(CellFlags::INVERTED));
        assert_eq!(state.grid.get_cell_at(0, 1).unwrap().bg, Rgba::WHITE);
        assert!(!flags(2).contains(CellFlags::INVERTED));
    }

    #[test]
    fn test_full_reset() {
        let mut state = TerminalState::new(4, 2);
        write_str(&mut state, "abcdef");
        state.set_fg_index(3);
        state.full_reset();

        assert_eq!(state.grid.get_cursor(), Point::new(0, 0));
        assert_eq!(row_text(&state, 0), "");
        assert_eq!(row_text(&state, 1), "");
        assert_eq!(state.pen, Pen::default());
    }
}
