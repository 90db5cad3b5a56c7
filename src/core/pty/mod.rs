//! Pseudo-terminal backends
//!
//! Both backends hold the same set of handles (master in/out, slave in/out,
//! a control handle for resizing and the child id) and expose them through
//! the [`Pty`] trait. [`NativePty`] picks the backend for the build target.

use std::io;
use thiserror::Error;

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub type NativePty = unix::UnixPty;
#[cfg(windows)]
pub type NativePty = windows::ConPty;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open pseudo terminal: {0}")]
    Open(#[source] io::Error),

    #[error("Failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    #[error("Failed to resize pseudo terminal: {0}")]
    Resize(#[source] io::Error),

    #[error("Failed to read from PTY: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write to PTY: {0}")]
    Write(#[source] io::Error),

    #[error("Failed to signal process group: {0}")]
    Signal(#[source] io::Error),

    #[error("Invalid command argument: {0:?}")]
    InvalidArgument(String),

    #[error("A process is already attached to this PTY")]
    AlreadySpawned,

    /// The child side is gone; no more output will arrive
    #[error("PTY closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, PtyError>;

/// OS process id of the spawned child
pub type ProcessId = u32;

/// Size of the pseudo terminal in character cells
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PtySize {
    pub cols: u16,
    pub rows: u16,
}

impl PtySize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols: cols.max(1),
            rows: rows.max(1),
        }
    }
}

impl Default for PtySize {
    fn default() -> Self {
        Self::new(80, 25)
    }
}

/// A pseudo terminal with at most one child process attached
pub trait Pty: Sized {
    /// Allocate the master/slave pair
    fn open(size: PtySize) -> Result<Self>;

    /// Start `program` on the slave side and release the parent's slave handles
    fn spawn(&mut self, program: &str, args: &[String]) -> Result<ProcessId>;

    /// Non-blocking read of child output. `Ok(0)` means nothing is available
    /// yet; [`PtyError::Closed`] means the child side has gone away.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn write(&mut self, data: &[u8]) -> Result<usize>;

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()>;

    /// Send SIGINT to the foreground process group.
    ///
    /// Returns `false` when the platform has no such notion and the caller
    /// should write the raw control byte instead.
    fn interrupt(&mut self) -> Result<bool>;

    /// Release every handle. Calling it again does nothing.
    fn close(&mut self);

    fn child_id(&self) -> Option<ProcessId>;
}
