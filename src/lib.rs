//! termcore - a terminal emulation core
//!
//! Interprets a child process's ANSI/VT output into a cell grid and runs the
//! child on a pseudo terminal (openpty on Unix, ConPTY on Windows).
//!
//! ```no_run
//! use std::sync::mpsc;
//! use termcore::{NativePty, PtySize, Session, SessionContext};
//!
//! let (tx, rx) = mpsc::channel();
//! let mut session: Session<NativePty> =
//!     Session::start(SessionContext::new(tx), PtySize::new(80, 25), "/bin/sh", &[])?;
//!
//! session.on_readable();
//! for _event in rx.try_iter() {
//!     session.state.grid.paint(|codepoint, row, col, fg, bg| {
//!         let _ = (codepoint, row, col, fg, bg);
//!     });
//! }
//! # Ok::<(), termcore::PtyError>(())
//! ```

pub mod config;
pub mod core;
pub mod ui;

pub use crate::core::pty::{NativePty, Pty, PtyError, PtySize};
pub use crate::core::session::{KeyAction, Session, SessionContext, SessionEvent};
pub use crate::core::term::{Cell, Grid, Point, Rgba, TerminalState, VtParser};
pub use crate::ui::keymapper::KeyMapper;
