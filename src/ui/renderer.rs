//! Terminal renderer using crossterm
//!
//! Paints a [`Grid`] onto the host terminal through the grid's `paint`
//! visitor. The cursor arrives as the last painted cell, so the host
//! terminal's own cursor stays hidden.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use tracing::debug;
use unicode_width::UnicodeWidthChar;

use crate::core::term::{Cell, Grid, Rgba};

/// Drawn in place of characters that do not occupy exactly one column
const REPLACEMENT: char = '?';

/// One host terminal cell
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderCell {
    pub ch: char,
    pub fg: Rgba,
    pub bg: Rgba,
}

impl Default for RenderCell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Rgba::WHITE,
            bg: Rgba::BLACK,
        }
    }
}

/// A composed screen, row major
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub cols: u16,
    pub rows: u16,
    pub cells: Vec<RenderCell>,
}

impl Frame {
    /// Collect everything `grid.paint` reports
    pub fn compose(grid: &Grid) -> Self {
        let (cols, rows) = grid.get_size();
        let mut cells = vec![RenderCell::default(); cols as usize * rows as usize];

        grid.paint(|codepoint, row, col, fg, bg| {
            let index = row as usize * cols as usize + col as usize;
            if let Some(slot) = cells.get_mut(index) {
                *slot = RenderCell {
                    ch: display_char(codepoint),
                    fg,
                    bg,
                };
            }
        });

        Self { cols, rows, cells }
    }

    pub fn get(&self, row: u16, col: u16) -> Option<&RenderCell> {
        if col >= self.cols {
            return None;
        }
        self.cells.get(row as usize * self.cols as usize + col as usize)
    }
}

/// Map a cell code point to something safe to print in one column
fn display_char(codepoint: u32) -> char {
    if codepoint == Cell::EMPTY {
        return ' ';
    }
    match char::from_u32(codepoint) {
        Some(ch) if ch.is_control() => ' ',
        Some(ch) if ch.width() == Some(1) => ch,
        _ => REPLACEMENT,
    }
}

/// Terminal renderer
pub struct Renderer {
    /// Whether the terminal has been initialized
    initialized: bool,
    /// Previous frame for diff rendering
    prev_frame: Option<Frame>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            initialized: false,
            prev_frame: None,
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;

        self.initialized = true;
        debug!("Renderer initialized");
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(
            stdout,
            ResetColor,
            SetAttribute(Attribute::Reset),
            Show,
            EnableLineWrap,
            LeaveAlternateScreen
        );
        let _ = stdout.flush();

        terminal::disable_raw_mode()
    }

    /// Forget the previous frame so the next render redraws everything
    pub fn invalidate(&mut self) {
        self.prev_frame = None;
    }

    /// Render the grid, redrawing only cells that changed since the last frame
    pub fn render(&mut self, grid: &Grid) -> io::Result<()> {
        let frame = Frame::compose(grid);

        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(65536, stdout.lock());

        let prev = self
            .prev_frame
            .take()
            .filter(|p| p.cols == frame.cols && p.rows == frame.rows);
        if prev.is_none() {
            queue!(stdout, ResetColor, Clear(ClearType::All))?;
        }

        self.write_frame(&mut stdout, &frame, prev.as_ref())?;

        stdout.flush()?;
        self.prev_frame = Some(frame);
        Ok(())
    }

    fn write_frame<W: Write>(&self, out: &mut W, frame: &Frame, prev: Option<&Frame>) -> io::Result<()> {
        let mut colors: Option<(Rgba, Rgba)> = None;
        let mut next_pos: Option<(u16, u16)> = None;

        for row in 0..frame.rows {
            for col in 0..frame.cols {
                let Some(cell) = frame.get(row, col) else {
                    continue;
                };
                if prev.and_then(|p| p.get(row, col)) == Some(cell) {
                    continue;
                }

                if next_pos != Some((col, row)) {
                    queue!(out, MoveTo(col, row))?;
                }
                if colors != Some((cell.fg, cell.bg)) {
                    queue!(
                        out,
                        SetForegroundColor(cell.fg.to_crossterm()),
                        SetBackgroundColor(cell.bg.to_crossterm())
                    )?;
                    colors = Some((cell.fg, cell.bg));
                }
                queue!(out, Print(cell.ch))?;
                next_pos = Some((col + 1, row));
            }
        }

        queue!(out, ResetColor)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::grid::{CURSOR_BG, CURSOR_FG};
    use crate::core::term::TerminalState;

    #[test]
    fn test_display_char() {
        assert_eq!(display_char('a' as u32), 'a');
        assert_eq!(display_char(Cell::EMPTY), ' ');
        assert_eq!(display_char('\t' as u32), ' ');
        assert_eq!(display_char('漢' as u32), REPLACEMENT);
        assert_eq!(display_char(0xD800), REPLACEMENT);
    }

    #[test]
    fn test_compose_places_cursor_last() {
        let mut state = TerminalState::new(4, 2);
        state.put_char('h' as u32);
        state.put_char('i' as u32);

        let frame = Frame::compose(&state.grid);
        assert_eq!(frame.get(0, 0).map(|c| c.ch), Some('h'));
        assert_eq!(frame.get(0, 1).map(|c| c.ch), Some('i'));

        let cursor = frame.get(0, 2).unwrap();
        assert_eq!((cursor.ch, cursor.fg, cursor.bg), (' ', CURSOR_FG, CURSOR_BG));
    }

    #[test]
    fn test_compose_hidden_cursor() {
        let mut state = TerminalState::new(4, 2);
        state.set_cursor_visible(false);

        let frame = Frame::compose(&state.grid);
        assert_eq!(frame.get(0, 0).unwrap().bg, Rgba(0));
        assert_eq!(frame.get(2, 0), None);
    }

    #[test]
    fn test_diff_writes_only_changes() {
        let mut state = TerminalState::new(40, 3);
        state.set_cursor_visible(false);
        let renderer = Renderer::new();
        let count = |out: &[u8], byte: u8| out.iter().filter(|&&b| b == byte).count();

        let first = Frame::compose(&state.grid);
        let mut full = Vec::new();
        renderer.write_frame(&mut full, &first, None).unwrap();
        assert_eq!(count(&full, b' '), 120);

        let mut unchanged = Vec::new();
        renderer.write_frame(&mut unchanged, &first, Some(&first)).unwrap();
        assert_eq!(count(&unchanged, b' '), 0);
        assert_eq!(count(&unchanged, b'x'), 0);

        state.put_char('x' as u32);
        let second = Frame::compose(&state.grid);
        let mut changed = Vec::new();
        renderer.write_frame(&mut changed, &second, Some(&first)).unwrap();

        // Only the one changed cell is printed, positioned at the origin
        let text = String::from_utf8_lossy(&changed);
        assert_eq!(count(&changed, b'x'), 1);
        assert_eq!(count(&changed, b' '), 0);
        assert!(text.starts_with("\x1b[1;1H"));
        assert!(changed.len() < full.len());
    }
}
