//! Host-side input and output.
//!
//! - **keymapper**: keyboard events to PTY byte sequences
//! - **renderer**: paints a grid onto the host terminal with crossterm

pub mod keymapper;
pub mod renderer;

pub use keymapper::{KeyMapper, Modifiers};
pub use renderer::{Frame, Renderer};
