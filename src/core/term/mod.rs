//! Terminal emulation: cell grid, drawing state and the VT parser

pub mod cell;
pub mod grid;
pub mod palette;
pub mod parser;
pub mod state;
pub mod utf8;

pub use cell::{Cell, CellFlags, Rgba};
pub use grid::{Grid, Point};
pub use parser::{ParserState, VtParser};
pub use state::{EraseMode, Pen, TerminalState};
