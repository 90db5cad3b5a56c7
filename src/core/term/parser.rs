//! VT sequence parser
//!
//! Consumes the child's output one byte at a time and applies it to a
//! [`TerminalState`]. Every state has a bounded way back to `Normal`:
//!
//! - `Escape` leaves on the very next byte
//! - `Csi` leaves on a final byte (0x40..=0x7E), on any byte outside
//!   0x20..=0x7E, or when the parameter buffer overflows
//! - `Osc` leaves on BEL, ST (0x9C) or ESC
//!
//! Unsupported or malformed sequences are logged and dropped.

use tracing::{debug, trace};

use super::cell::Rgba;
use super::palette;
use super::state::{EraseMode, TerminalState};
use super::utf8::{self, Decoded};

/// Longest CSI parameter text accepted before the sequence is abandoned
const MAX_CSI_LEN: usize = 64;
/// OSC payload bytes kept for logging; the rest is dropped
const MAX_OSC_LEN: usize = 4096;

/// Parser state machine
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ParserState {
    #[default]
    Normal,
    /// Following an ESC byte
    Escape,
    /// Control Sequence Introducer, collecting parameter bytes
    Csi(Vec<u8>),
    /// Operating System Command, collecting the payload
    Osc(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct VtParser {
    state: ParserState,
    /// Leading bytes of a UTF-8 sequence cut off by the end of a chunk
    utf8_pending: Vec<u8>,
}

impl VtParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    /// Whether an escape sequence is in progress
    pub fn is_mid_sequence(&self) -> bool {
        self.state != ParserState::Normal
    }

    /// Feed a single byte to the parser
    pub fn feed(&mut self, byte: u8, term: &mut TerminalState) {
        self.advance(term, &[byte]);
    }

    /// Feed a chunk of bytes to the parser
    pub fn advance(&mut self, term: &mut TerminalState, bytes: &[u8]) {
        let mut rest = bytes;

        if !self.utf8_pending.is_empty() {
            let used = self.finish_pending(term, rest);
            rest = &rest[used..];
        }

        while !rest.is_empty() {
            let used = self.step(term, rest);
            rest = &rest[used..];
        }
    }

    /// Process the byte at the start of `bytes`, returning how many were used.
    ///
    /// Returns 0 only after switching back to `Normal`, so the same byte is
    /// then handled by the Normal rules.
    fn step(&mut self, term: &mut TerminalState, bytes: &[u8]) -> usize {
        let byte = bytes[0];

        match self.state {
            ParserState::Normal => self.normal(term, bytes),
            ParserState::Escape => {
                self.escape(byte, term);
                1
            }
            ParserState::Csi(_) => self.csi(byte, term),
            ParserState::Osc(_) => {
                self.osc(byte);
                1
            }
        }
    }

    fn normal(&mut self, term: &mut TerminalState, bytes: &[u8]) -> usize {
        match bytes[0] {
            byte @ 0x20..=0x7E => {
                term.put_char(u32::from(byte));
                1
            }
            0x80..=0xFF => match utf8::decode(bytes) {
                Decoded::Char(ch, len) => {
                    term.put_char(ch as u32);
                    len
                }
                Decoded::Incomplete => {
                    self.utf8_pending.extend_from_slice(bytes);
                    bytes.len()
                }
                Decoded::Invalid => {
                    trace!("Dropping malformed UTF-8 byte {:#04x}", bytes[0]);
                    1
                }
            },
            b'\n' => {
                term.line_break();
                1
            }
            b'\r' => {
                term.carriage_return();
                1
            }
            0x08 => {
                term.backspace();
                1
            }
            b'\t' => {
                term.put_char(u32::from(b'\t'));
                1
            }
            0x1B => {
                self.state = ParserState::Escape;
                1
            }
            // BEL, DEL and the remaining C0 controls
            _ => 1,
        }
    }

    /// Complete a UTF-8 sequence started in a previous chunk
    fn finish_pending(&mut self, term: &mut TerminalState, bytes: &[u8]) -> usize {
        let needed = utf8::sequence_len(self.utf8_pending[0]).unwrap_or(1);
        let mut used = 0;

        while self.utf8_pending.len() < needed {
            match bytes.get(used) {
                Some(&b) if utf8::is_continuation(b) => {
                    self.utf8_pending.push(b);
                    used += 1;
                }
                Some(_) => {
                    trace!("Dropping truncated UTF-8 sequence {:02x?}", self.utf8_pending);
                    self.utf8_pending.clear();
                    return used;
                }
                None => return used,
            }
        }

        match utf8::decode(&self.utf8_pending) {
            Decoded::Char(ch, _) => term.put_char(ch as u32),
            _ => trace!("Dropping malformed UTF-8 sequence {:02x?}", self.utf8_pending),
        }
        self.utf8_pending.clear();
        used
    }

    fn escape(&mut self, byte: u8, term: &mut TerminalState) {
        self.state = match byte {
            b'[' => ParserState::Csi(Vec::new()),
            b']' => ParserState::Osc(Vec::new()),
            b'c' => {
                // RIS - Full reset
                term.full_reset();
                ParserState::Normal
            }
            // Second half of an ESC \ string terminator
            b'\\' => ParserState::Normal,
            _ => {
                debug!("Unsupported escape: ESC {:?}", byte as char);
                ParserState::Normal
            }
        };
    }

    fn csi(&mut self, byte: u8, term: &mut TerminalState) -> usize {
        match byte {
            0x40..=0x7E => {
                if let ParserState::Csi(params) = std::mem::take(&mut self.state) {
                    self.execute_csi(&params, byte, term);
                }
                1
            }
            0x20..=0x3F => {
                let overflow = match &mut self.state {
                    ParserState::Csi(params) if params.len() < MAX_CSI_LEN => {
                        params.push(byte);
                        false
                    }
                    _ => true,
                };
                if overflow {
                    debug!("Abandoning CSI sequence longer than {} bytes", MAX_CSI_LEN);
                    self.state = ParserState::Normal;
                }
                1
            }
            _ => {
                debug!("Abandoning CSI sequence at byte {:#04x}", byte);
                self.state = ParserState::Normal;
                0
            }
        }
    }

    fn osc(&mut self, byte: u8) {
        match byte {
            0x07 | 0x9C => {
                self.finish_osc();
            }
            0x1B => {
                self.finish_osc();
                self.state = ParserState::Escape;
            }
            _ => {
                if let ParserState::Osc(data) = &mut self.state {
                    if data.len() < MAX_OSC_LEN {
                        data.push(byte);
                    }
                }
            }
        }
    }

    /// OSC commands are not implemented; the payload is dropped
    fn finish_osc(&mut self) {
        if let ParserState::Osc(data) = std::mem::take(&mut self.state) {
            trace!("Discarding OSC: {}", String::from_utf8_lossy(&data));
        }
    }

    fn execute_csi(&self, text: &[u8], final_byte: u8, term: &mut TerminalState) {
        let params = parse_params(text, 0).unwrap_or_default();
        let amount = first_or_one(&params);

        match final_byte {
            b'A' => term.grid.move_cursor(0, -amount),
            b'B' => term.grid.move_cursor(0, amount),
            b'C' => term.grid.move_cursor(amount, 0),
            b'D' => term.grid.move_cursor(-amount, 0),
            b'E' => term.grid.move_cursor(0, amount),
            b'F' => term.grid.move_cursor(0, -amount),
            b'G' => {
                // CHA - Cursor Character Absolute
                let row = term.grid.get_cursor().y;
                term.grid.set_cursor(amount - 1, i32::from(row));
            }
            b'H' | b'f' => {
                // CUP - Cursor Position (1-based)
                let row = amount;
                let col = i32::from(params.get(1).copied().unwrap_or(1).max(1));
                term.grid.set_cursor(col - 1, row - 1);
            }
            b'J' => {
                let mode = params.first().copied().unwrap_or(0);
                match EraseMode::from_param(mode) {
                    Some(mode) => term.erase_display(mode),
                    None => debug!("Unsupported erase display mode {}", mode),
                }
            }
            b'K' => {
                let mode = params.first().copied().unwrap_or(0);
                match EraseMode::from_param(mode) {
                    Some(mode) => term.erase_line(mode),
                    None => debug!("Unsupported erase line mode {}", mode),
                }
            }
            b'S' | b'T' => {
                debug!(
                    "Escape sequence \\e[{}{} not implemented",
                    String::from_utf8_lossy(text),
                    final_byte as char
                );
            }
            b'm' => match parse_params(text, 0) {
                Some(params) => self.execute_sgr(&params, term),
                None => debug!("Malformed SGR parameters {:?}", String::from_utf8_lossy(text)),
            },
            b'h' | b'l' => {
                if text.starts_with(b"?25") {
                    term.set_cursor_visible(final_byte == b'h');
                } else {
                    trace!(
                        "Ignoring mode {}{}",
                        String::from_utf8_lossy(text),
                        final_byte as char
                    );
                }
            }
            _ => {
                debug!(
                    "Unsupported escape sequence \\e[{}{}",
                    String::from_utf8_lossy(text),
                    final_byte as char
                );
            }
        }
    }

    /// Dispatch on the first parameter; only `38`/`48` read the rest
    fn execute_sgr(&self, params: &[u16], term: &mut TerminalState) {
        let Some((&command, tail)) = params.split_first() else {
            term.reset_attributes();
            return;
        };

        match command {
            0 => term.reset_attributes(),
            1 => term.set_bold(true),
            7 => term.invert_colors(),

            30..=37 => term.set_fg_index((command - 30) as u8),
            38 => {
                if let Some(color) = extended_color(tail) {
                    term.set_fg(color);
                }
            }
            39 => term.set_fg_index(palette::DEFAULT_FG),

            40..=47 => term.set_bg_index((command - 40) as u8),
            48 => {
                if let Some(color) = extended_color(tail) {
                    term.set_bg(color);
                }
            }
            49 => term.set_bg_index(palette::DEFAULT_BG),

            90..=97 => term.set_fg_index((command - 90 + 8) as u8),
            100..=107 => term.set_bg_index((command - 100 + 8) as u8),

            _ => debug!("SGR command {} not implemented", command),
        }

        if !tail.is_empty() && !matches!(command, 38 | 48) {
            trace!("Ignoring SGR parameters after {}: {:?}", command, tail);
        }
    }
}

/// Parse `;`-separated decimal parameters.
///
/// Empty slots resolve to `default`. Returns `None` if the text contains
/// anything other than digits, separators and spaces.
fn parse_params(text: &[u8], default: u16) -> Option<Vec<u16>> {
    let mut params = Vec::new();
    let mut current: Option<u16> = None;
    let mut after_separator = false;

    for &byte in text {
        match byte {
            b'0'..=b'9' => {
                let digit = u16::from(byte - b'0');
                current = Some(current.unwrap_or(0).saturating_mul(10).saturating_add(digit));
                after_separator = false;
            }
            b';' => {
                params.push(current.take().unwrap_or(default));
                after_separator = true;
            }
            b' ' => {}
            _ => return None,
        }
    }

    if let Some(value) = current {
        params.push(value);
    } else if after_separator {
        params.push(default);
    }

    Some(params)
}

/// The first parameter, with 0 or absent meaning 1
fn first_or_one(params: &[u16]) -> i32 {
    i32::from(params.first().copied().unwrap_or(0).max(1))
}

/// Decode the tail of `38;5;N` or `38;2;R;G;B` (same for 48)
fn extended_color(tail: &[u16]) -> Option<Rgba> {
    match *tail {
        [5, index] if index <= 255 => Some(palette::color(index as u8)),
        [2, r, g, b] => Some(Rgba::from_rgb(channel(r), channel(g), channel(b))),
        _ => {
            debug!("Unsupported extended color {:?}", tail);
            None
        }
    }
}

fn channel(value: u16) -> u8 {
    value.min(255) as u8
}
