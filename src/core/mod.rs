//! Core terminal emulation components.
//!
//! - **pty**: pseudo-terminal backends (openpty on Unix, ConPTY on Windows)
//! - **term**: cell grid, pen state and the escape sequence parser
//! - **session**: drives one child process through a PTY into the grid
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── NativePty (PTY I/O with the child process)
//! ├── VtParser (byte stream -> state changes)
//! └── TerminalState
//!     ├── Grid (cells, cursor, scrollback)
//!     └── Pen (current colors)
//! ```

pub mod pty;
pub mod session;
pub mod term;
