//! Cell grid with cursor, erase and scroll operations.
//!
//! The row store is anchored at the top: rows `0..num_visible_rows` are on
//! screen. Rows past the visible height are kept when the grid shrinks so a
//! later grow shows them again. Rows scrolled off the top go to a bounded
//! history ring when the grid has scrollback capacity, and are dropped
//! otherwise.

use std::collections::VecDeque;

use super::cell::{Cell, CellFlags, Rgba};

/// Colors used for the block drawn at the cursor position
pub const CURSOR_FG: Rgba = Rgba::BLACK;
pub const CURSOR_BG: Rgba = Rgba::WHITE;

/// A grid position, `x` is the column and `y` the row
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

#[derive(Clone)]
struct Row {
    cells: Vec<Cell>,
}

impl Row {
    fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::empty(); cols as usize],
        }
    }

    fn resize(&mut self, cols: u16) {
        self.cells.resize(cols as usize, Cell::empty());
    }
}

pub struct Grid {
    rows: Vec<Row>,
    scrollback: VecDeque<Row>,
    scrollback_limit: usize,
    cursor: Point,
    cursor_visible: bool,
    /// The number of rows that are visible on the screen
    num_visible_rows: u16,
    /// Size of each row in cells
    row_size: u16,
}

impl Grid {
    /// Create a grid without scrollback capacity
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_scrollback(cols, rows, 0)
    }

    pub fn with_scrollback(cols: u16, rows: u16, scrollback_limit: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            rows: (0..rows).map(|_| Row::new(cols)).collect(),
            scrollback: VecDeque::new(),
            scrollback_limit,
            cursor: Point::default(),
            cursor_visible: true,
            num_visible_rows: rows,
            row_size: cols,
        }
    }

    /// Size as `(cols, rows)`
    pub fn get_size(&self) -> (u16, u16) {
        (self.row_size, self.num_visible_rows)
    }

    pub fn get_cursor(&self) -> Point {
        self.cursor
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }

    /// Cell at a visible position, `None` outside the grid
    pub fn get_cell_at(&self, row: u16, col: u16) -> Option<Cell> {
        if row >= self.num_visible_rows || col >= self.row_size {
            return None;
        }
        self.rows
            .get(row as usize)
            .and_then(|r| r.cells.get(col as usize))
            .copied()
    }

    /// Number of rows held in scrollback history
    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    /// A history row, 0 being the oldest
    pub fn scrollback_row(&self, index: usize) -> Option<&[Cell]> {
        self.scrollback.get(index).map(|r| r.cells.as_slice())
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        let cols = cols.max(1);
        let rows = rows.max(1);

        while self.rows.len() < rows as usize {
            self.rows.push(Row::new(cols));
        }
        for row in &mut self.rows {
            row.resize(cols);
        }
        for row in &mut self.scrollback {
            row.resize(cols);
        }

        self.row_size = cols;
        self.num_visible_rows = rows;

        self.cursor.x = self.cursor.x.min(cols - 1);
        self.cursor.y = self.cursor.y.min(rows - 1);
    }

    /// Write a cell at the cursor and advance, wrapping at the end of the row
    pub fn put_cell_at_cursor(&mut self, cell: Cell) {
        let (x, y) = (self.cursor.x as usize, self.cursor.y as usize);
        let wraps = self.cursor.x + 1 >= self.row_size;

        let cell = if wraps {
            cell.with_flags(cell.flags | CellFlags::WRAPPED)
        } else {
            cell
        };
        self.rows[y].cells[x] = cell;

        if wraps {
            self.cursor.x = 0;
            self.next_row();
        } else {
            self.cursor.x += 1;
        }
    }

    pub fn carriage_return(&mut self) {
        self.cursor.x = 0;
    }

    /// Move the cursor down one row, scrolling at the bottom
    pub fn next_row(&mut self) {
        debug_assert!(self.cursor.y < self.num_visible_rows);

        if self.cursor.y + 1 < self.num_visible_rows {
            self.cursor.y += 1;
        } else {
            self.scroll_up();
        }
    }

    fn scroll_up(&mut self) {
        let visible = self.num_visible_rows as usize;
        let departed = std::mem::replace(&mut self.rows[0], Row::new(self.row_size));
        // The fresh row at the top rotates down to the last visible slot
        self.rows[..visible].rotate_left(1);

        if self.scrollback_limit > 0 {
            self.scrollback.push_back(departed);
            if self.scrollback.len() > self.scrollback_limit {
                self.scrollback.pop_front();
            }
        }
    }

    pub fn move_cursor(&mut self, dx: i32, dy: i32) {
        let x = i32::from(self.cursor.x) + dx;
        let y = i32::from(self.cursor.y) + dy;
        self.set_cursor(x, y);
    }

    pub fn set_cursor(&mut self, x: i32, y: i32) {
        let x = x.clamp(0, i32::from(self.row_size) - 1);
        let y = y.clamp(0, i32::from(self.num_visible_rows) - 1);
        self.cursor = Point::new(x as u16, y as u16);
    }

    /// Erase the inclusive range `start..=end` in reading order
    pub fn erase_display(&mut self, start: Point, end: Point) {
        debug_assert!((start.y, start.x) <= (end.y, end.x));
        debug_assert!(end.x < self.row_size && end.y < self.num_visible_rows);

        let last_col = self.row_size - 1;
        for y in start.y..=end.y {
            let from = if y == start.y { start.x } else { 0 };
            let to = if y == end.y { end.x } else { last_col };
            self.erase_line(y, from, to);
        }
    }

    /// Erase columns `start..=end` of `row`
    pub fn erase_line(&mut self, row: u16, start: u16, end: u16) {
        debug_assert!(row < self.num_visible_rows);
        debug_assert!(start <= end);
        debug_assert!(end < self.row_size);

        let cells = &mut self.rows[row as usize].cells[start as usize..=end as usize];
        cells.fill(Cell::empty());
    }

    /// Visit `(codepoint, row, col, fg, bg)` for every visible cell, then the cursor
    pub fn paint<F>(&self, mut visitor: F)
    where
        F: FnMut(u32, u16, u16, Rgba, Rgba),
    {
        for (y, row) in self.rows.iter().take(self.num_visible_rows as usize).enumerate() {
            for (x, cell) in row.cells.iter().take(self.row_size as usize).enumerate() {
                visitor(cell.codepoint, y as u16, x as u16, cell.fg, cell.bg);
            }
        }

        if self.cursor_visible {
            visitor(' ' as u32, self.cursor.y, self.cursor.x, CURSOR_FG, CURSOR_BG);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(ch: char) -> Cell {
        Cell::new(ch as u32, Rgba::WHITE, Rgba::BLACK)
    }

    fn ch_at(grid: &Grid, row: u16, col: u16) -> Option<char> {
        grid.get_cell_at(row, col).and_then(|c| c.ch())
    }

    /// Write one distinct letter at the start of every row
    fn label_rows(grid: &mut Grid) {
        let (_, rows) = grid.get_size();
        for y in 0..rows {
            grid.set_cursor(0, i32::from(y));
            grid.put_cell_at_cursor(cell((b'a' + y as u8) as char));
        }
        grid.set_cursor(0, 0);
    }

    #[test]
    fn test_put_advances_and_wraps() {
        let mut grid = Grid::new(3, 2);
        grid.put_cell_at_cursor(cell('a'));
        assert_eq!(grid.get_cursor(), Point::new(1, 0));
        grid.put_cell_at_cursor(cell('b'));
        grid.put_cell_at_cursor(cell('c'));
        assert_eq!(grid.get_cursor(), Point::new(0, 1));

        let last = grid.get_cell_at(0, 2).unwrap();
        assert!(last.flags.contains(CellFlags::WRAPPED));
        assert!(!grid.get_cell_at(0, 1).unwrap().flags.contains(CellFlags::WRAPPED));
    }

    #[test]
    fn test_cursor_clamping() {
        let mut grid = Grid::new(10, 5);
        grid.set_cursor(100, -4);
        assert_eq!(grid.get_cursor(), Point::new(9, 0));
        grid.move_cursor(-20, 20);
        assert_eq!(grid.get_cursor(), Point::new(0, 4));
    }

    #[test]
    fn test_next_row_ring_scroll() {
        let mut grid = Grid::new(4, 3);
        label_rows(&mut grid);

        for _ in 0..3 {
            grid.next_row();
        }

        assert_eq!(grid.get_cursor().y, 2);
        assert_eq!(ch_at(&grid, 0, 0), Some('b'));
        assert_eq!(ch_at(&grid, 1, 0), Some('c'));
        assert_eq!(ch_at(&grid, 2, 0), None);
        assert_eq!(grid.scrollback_len(), 0);
    }

    #[test]
    fn test_next_row_keeps_history_with_capacity() {
        let mut grid = Grid::with_scrollback(4, 2, 2);
        label_rows(&mut grid);

        grid.set_cursor(0, 1);
        grid.next_row();
        grid.next_row();
        grid.next_row();

        // a, b, <blank> scrolled off; only the two newest are kept
        assert_eq!(grid.scrollback_len(), 2);
        assert_eq!(grid.scrollback_row(0).unwrap()[0].ch(), Some('b'));
        assert!(grid.scrollback_row(1).unwrap()[0].is_empty());
    }

    #[test]
    fn test_erase_display_range() {
        let mut grid = Grid::new(3, 3);
        for _ in 0..8 {
            grid.put_cell_at_cursor(cell('x'));
        }

        grid.erase_display(Point::new(1, 0), Point::new(1, 2));

        assert_eq!(ch_at(&grid, 0, 0), Some('x'));
        assert_eq!(ch_at(&grid, 0, 1), None);
        assert_eq!(ch_at(&grid, 1, 0), None);
        assert_eq!(ch_at(&grid, 1, 2), None);
        assert_eq!(ch_at(&grid, 2, 1), None);
        assert_eq!(ch_at(&grid, 2, 2), None);
        assert_eq!(ch_at(&grid, 2, 0), None);
    }

    #[test]
    fn test_erase_line_range() {
        let mut grid = Grid::new(6, 2);
        for ch in "hello".chars() {
            grid.put_cell_at_cursor(cell(ch));
        }
        grid.erase_line(0, 1, 3);
        assert_eq!(ch_at(&grid, 0, 0), Some('h'));
        assert_eq!(ch_at(&grid, 0, 2), None);
        assert_eq!(ch_at(&grid, 0, 4), Some('o'));
    }

    #[test]
    fn test_last_column_wraps_eagerly_on_single_row() {
        let mut grid = Grid::new(5, 1);
        for ch in "hello".chars() {
            grid.put_cell_at_cursor(cell(ch));
        }

        // Filling the last column wraps at once, scrolling the only row away
        assert_eq!(grid.get_cursor(), Point::new(0, 0));
        assert_eq!(ch_at(&grid, 0, 0), None);
        assert_eq!(ch_at(&grid, 0, 4), None);
    }

    #[test]
    fn test_resize_round_trip_preserves_content() {
        let mut grid = Grid::new(6, 4);
        label_rows(&mut grid);
        grid.set_cursor(5, 3);

        grid.resize(3, 2);
        assert_eq!(grid.get_size(), (3, 2));
        assert_eq!(grid.get_cursor(), Point::new(2, 1));
        assert_eq!(grid.get_cell_at(3, 0), None);

        grid.resize(6, 4);
        for (y, expected) in ['a', 'b', 'c', 'd'].into_iter().enumerate() {
            assert_eq!(ch_at(&grid, y as u16, 0), Some(expected));
        }
    }

    #[test]
    fn test_scrollback_limit_across_resize() {
        let mut grid = Grid::with_scrollback(3, 4, 1);
        label_rows(&mut grid);

        grid.resize(3, 2);
        assert_eq!(grid.get_size(), (3, 2));
        assert_eq!(grid.get_cell_at(2, 0), None);

        grid.set_cursor(0, 1);
        grid.next_row();
        grid.next_row();

        // Two rows scrolled off, only the newest fits in history
        assert_eq!(grid.scrollback_len(), 1);
        assert_eq!(grid.scrollback_row(0).unwrap()[0].ch(), Some('b'));
        assert_eq!(ch_at(&grid, 0, 0), None);
        assert_eq!(ch_at(&grid, 1, 0), None);

        // Rows hidden by the shrink were not scrolled and come back
        grid.resize(3, 4);
        assert_eq!(ch_at(&grid, 0, 0), None);
        assert_eq!(ch_at(&grid, 2, 0), Some('c'));
        assert_eq!(ch_at(&grid, 3, 0), Some('d'));
    }

    #[test]
    fn test_get_cell_outside_bounds() {
        let grid = Grid::new(80, 25);
        assert!(grid.get_cell_at(0, 0).is_some());
        assert!(grid.get_cell_at(25, 0).is_none());
        assert!(grid.get_cell_at(0, 80).is_none());
    }

    #[test]
    fn test_paint_draws_cursor_last() {
        let mut grid = Grid::new(2, 2);
        grid.put_cell_at_cursor(cell('q'));

        let mut calls = Vec::new();
        grid.paint(|cp, row, col, fg, bg| calls.push((cp, row, col, fg, bg)));

        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0], ('q' as u32, 0, 0, Rgba::WHITE, Rgba::BLACK));
        assert_eq!(calls[1].0, Cell::EMPTY);
        assert_eq!(calls[4], (' ' as u32, 0, 1, CURSOR_FG, CURSOR_BG));

        grid.set_cursor_visible(false);
        let mut count = 0;
        grid.paint(|_, _, _, _, _| count += 1);
        assert_eq!(count, 4);
    }
}
