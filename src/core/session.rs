//! Session management
//!
//! Drives one child process: PTY output is pushed through the parser into the
//! terminal state, and keystrokes flow the other way.

use std::sync::mpsc::Sender;

use tracing::{debug, info, trace, warn};

use super::pty::{NativePty, Pty, PtyError, PtySize};
use super::term::{TerminalState, VtParser};

/// Read size when none is configured
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// What a key press asks the session to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// Send these bytes to the child
    Write(Vec<u8>),
    /// Interrupt the foreground process group
    Interrupt,
}

/// Session events
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The grid changed and should be painted again
    Repaint,
    /// The child side of the PTY has gone away
    Exited,
}

/// Everything a session needs from its host
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub events: Sender<SessionEvent>,
    pub read_chunk_size: usize,
    pub scrollback_limit: usize,
}

impl SessionContext {
    pub fn new(events: Sender<SessionEvent>) -> Self {
        Self {
            events,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            scrollback_limit: 0,
        }
    }
}

/// A shell session
pub struct Session<P: Pty = NativePty> {
    /// Terminal state
    pub state: TerminalState,
    parser: VtParser,
    pty: P,
    ctx: SessionContext,
    buffer: Vec<u8>,
    running: bool,
}

impl<P: Pty> Session<P> {
    /// Open a PTY of `size`, apply the size and start `program` on it.
    ///
    /// Any failure here is returned to the caller.
    pub fn start(
        ctx: SessionContext,
        size: PtySize,
        program: &str,
        args: &[String],
    ) -> Result<Self, PtyError> {
        let mut pty = P::open(size)?;
        pty.resize(size.cols, size.rows)?;
        pty.spawn(program, args)?;

        Ok(Self::with_pty(ctx, size, pty))
    }

    /// Wrap an already prepared PTY
    pub fn with_pty(ctx: SessionContext, size: PtySize, pty: P) -> Self {
        let chunk = ctx.read_chunk_size.max(1);

        Self {
            state: TerminalState::with_scrollback(size.cols, size.rows, ctx.scrollback_limit),
            parser: VtParser::new(),
            pty,
            ctx,
            buffer: vec![0u8; chunk],
            running: true,
        }
    }

    /// Check if session is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pty(&self) -> &P {
        &self.pty
    }

    /// Read one chunk of child output and apply it.
    ///
    /// Sends a single [`SessionEvent::Repaint`] per non-empty chunk and
    /// returns the number of bytes processed.
    pub fn on_readable(&mut self) -> usize {
        if !self.running {
            return 0;
        }

        match self.pty.read(&mut self.buffer) {
            Ok(0) => 0,
            Ok(n) => {
                trace!("Read {} bytes from pty", n);
                self.parser.advance(&mut self.state, &self.buffer[..n]);
                self.emit(SessionEvent::Repaint);
                n
            }
            Err(PtyError::Closed) => {
                info!("Child process closed the pty");
                self.running = false;
                self.pty.close();
                self.emit(SessionEvent::Exited);
                0
            }
            Err(e) => {
                warn!("Dropping read cycle: {}", e);
                0
            }
        }
    }

    /// Feed raw bytes into the terminal without going through the PTY
    pub fn feed_bytes(&mut self, bytes: &[u8]) {
        self.parser.advance(&mut self.state, bytes);
    }

    /// Write input to the PTY
    pub fn write(&mut self, data: &[u8]) -> Result<usize, PtyError> {
        self.pty.write(data)
    }

    /// Deliver a mapped key press. Errors are logged, never returned.
    pub fn send_key(&mut self, action: KeyAction) {
        let result = match action {
            KeyAction::Write(bytes) => self.pty.write(&bytes).map(drop),
            KeyAction::Interrupt => match self.pty.interrupt() {
                Ok(true) => Ok(()),
                Ok(false) => self.pty.write(&[0x03]).map(drop),
                Err(e) => {
                    debug!("Interrupt failed ({}), sending ^C instead", e);
                    self.pty.write(&[0x03]).map(drop)
                }
            },
        };

        if let Err(e) = result {
            warn!("Failed to send key: {}", e);
        }
    }

    /// Resize the terminal
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.state.resize(cols, rows);
        let (cols, rows) = self.state.grid.get_size();
        self.pty.resize(cols, rows)
    }

    pub fn close(&mut self) {
        self.running = false;
        self.pty.close();
    }

    fn emit(&self, event: SessionEvent) {
        if self.ctx.events.send(event).is_err() {
            trace!("No receiver for {:?}", event);
        }
    }
}
