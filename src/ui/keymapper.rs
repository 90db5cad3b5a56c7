//! Key mapping for terminal input
//!
//! Converts key events to the bytes a shell expects on its stdin.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::session::KeyAction;

/// Byte sent for Enter
#[cfg(windows)]
pub const ENTER: u8 = b'\r';
#[cfg(not(windows))]
pub const ENTER: u8 = b'\n';

/// Byte sent for Backspace. Unix shells get BS, the Windows console DEL.
#[cfg(windows)]
pub const BACKSPACE: u8 = 0x7F;
#[cfg(not(windows))]
pub const BACKSPACE: u8 = 0x08;

/// Ctrl+C becomes a process group signal where the PTY supports one
const CTRL_C_INTERRUPTS: bool = cfg!(unix);

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Key mapper for converting key events to bytes
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent, `None` for keys with no encoding
    pub fn map(event: &KeyEvent) -> Option<KeyAction> {
        if event.kind == KeyEventKind::Release {
            return None;
        }

        let mods = Modifiers::from(event.modifiers);

        if let KeyCode::Char(ch) = event.code {
            if CTRL_C_INTERRUPTS && mods == Modifiers::CTRL && ch.eq_ignore_ascii_case(&'c') {
                return Some(KeyAction::Interrupt);
            }
        }

        Self::map_bytes(event.code, mods).map(KeyAction::Write)
    }

    fn map_bytes(code: KeyCode, mods: Modifiers) -> Option<Vec<u8>> {
        match code {
            KeyCode::Char(ch) => Some(Self::map_char(ch, mods)),

            KeyCode::Enter => Some(vec![ENTER]),

            KeyCode::Backspace => {
                if mods.contains(Modifiers::ALT) {
                    Some(vec![0x1B, BACKSPACE])
                } else {
                    Some(vec![BACKSPACE])
                }
            }

            KeyCode::Tab => Some(vec![b'\t']),
            KeyCode::BackTab => Some(b"\x1b[Z".to_vec()),

            KeyCode::Esc => Some(vec![0x1B]),

            KeyCode::Up => Some(Self::cursor_key(b'A', mods)),
            KeyCode::Down => Some(Self::cursor_key(b'B', mods)),
            KeyCode::Right => Some(Self::cursor_key(b'C', mods)),
            KeyCode::Left => Some(Self::cursor_key(b'D', mods)),
            KeyCode::Home => Some(Self::cursor_key(b'H', mods)),
            KeyCode::End => Some(Self::cursor_key(b'F', mods)),

            KeyCode::Insert => Some(Self::tilde_key(2, mods)),
            KeyCode::Delete => Some(Self::tilde_key(3, mods)),
            KeyCode::PageUp => Some(Self::tilde_key(5, mods)),
            KeyCode::PageDown => Some(Self::tilde_key(6, mods)),

            _ => None,
        }
    }

    /// Map a character with modifiers
    fn map_char(ch: char, mods: Modifiers) -> Vec<u8> {
        let ctrl = mods.contains(Modifiers::CTRL);
        let alt = mods.contains(Modifiers::ALT);

        if ctrl {
            if let Some(code) = Self::control_code(ch) {
                return if alt { vec![0x1B, code] } else { vec![code] };
            }
        }

        let mut buf = [0u8; 4];
        let encoded = ch.encode_utf8(&mut buf).as_bytes();

        // Alt + key = ESC + key
        if alt {
            let mut bytes = vec![0x1B];
            bytes.extend_from_slice(encoded);
            return bytes;
        }

        encoded.to_vec()
    }

    /// C0 code for Ctrl + `ch`
    fn control_code(ch: char) -> Option<u8> {
        match ch {
            'a'..='z' => Some(ch as u8 - b'a' + 1),
            'A'..='Z' => Some(ch as u8 - b'A' + 1),
            '@' | '`' | ' ' => Some(0x00),
            '[' => Some(0x1B),
            '\\' => Some(0x1C),
            ']' => Some(0x1D),
            '^' | '~' => Some(0x1E),
            '_' | '?' => Some(0x1F),
            _ => None,
        }
    }

    /// Arrow, Home and End: `ESC [ key`, or `ESC [ 1 ; mod key` with modifiers
    fn cursor_key(key: u8, mods: Modifiers) -> Vec<u8> {
        if mods.is_empty() {
            vec![0x1B, b'[', key]
        } else {
            format!("\x1b[1;{}{}", Self::modifier_code(mods), key as char).into_bytes()
        }
    }

    /// Tilde key sequence (Insert, Delete, PageUp, PageDown)
    fn tilde_key(code: u8, mods: Modifiers) -> Vec<u8> {
        if mods.is_empty() {
            format!("\x1b[{}~", code).into_bytes()
        } else {
            format!("\x1b[{};{}~", code, Self::modifier_code(mods)).into_bytes()
        }
    }

    /// Calculate xterm modifier code
    fn modifier_code(mods: Modifiers) -> u8 {
        1 + if mods.contains(Modifiers::SHIFT) { 1 } else { 0 }
            + if mods.contains(Modifiers::ALT) { 2 } else { 0 }
            + if mods.contains(Modifiers::CTRL) { 4 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    fn bytes(code: KeyCode, mods: KeyModifiers) -> Option<Vec<u8>> {
        match KeyMapper::map(&key_event(code, mods)) {
            Some(KeyAction::Write(bytes)) => Some(bytes),
            _ => None,
        }
    }

    #[test]
    fn test_char_keys() {
        assert_eq!(bytes(KeyCode::Char('a'), KeyModifiers::NONE), Some(b"a".to_vec()));
        assert_eq!(
            bytes(KeyCode::Char('é'), KeyModifiers::NONE),
            Some("é".as_bytes().to_vec())
        );
        assert_eq!(bytes(KeyCode::Char('x'), KeyModifiers::ALT), Some(vec![0x1B, b'x']));
        assert_eq!(bytes(KeyCode::Char('d'), KeyModifiers::CONTROL), Some(vec![0x04]));
        assert_eq!(
            bytes(KeyCode::Char('b'), KeyModifiers::CONTROL | KeyModifiers::ALT),
            Some(vec![0x1B, 0x02])
        );
        assert_eq!(bytes(KeyCode::Char('['), KeyModifiers::CONTROL), Some(vec![0x1B]));
    }

    #[test]
    fn test_editing_keys() {
        assert_eq!(bytes(KeyCode::Enter, KeyModifiers::NONE), Some(vec![ENTER]));
        assert_eq!(bytes(KeyCode::Backspace, KeyModifiers::NONE), Some(vec![BACKSPACE]));
        assert_eq!(bytes(KeyCode::Tab, KeyModifiers::NONE), Some(vec![b'\t']));
        assert_eq!(bytes(KeyCode::Esc, KeyModifiers::NONE), Some(vec![0x1B]));
    }

    #[test]
    #[cfg(not(windows))]
    fn test_unix_line_discipline_bytes() {
        assert_eq!(ENTER, b'\n');
        assert_eq!(BACKSPACE, 0x08);
    }

    #[test]
    #[cfg(windows)]
    fn test_windows_console_bytes() {
        assert_eq!(ENTER, b'\r');
        assert_eq!(BACKSPACE, 0x7F);
    }

    #[test]
    fn test_arrow_keys() {
        assert_eq!(bytes(KeyCode::Up, KeyModifiers::NONE), Some(b"\x1b[A".to_vec()));
        assert_eq!(bytes(KeyCode::Down, KeyModifiers::NONE), Some(b"\x1b[B".to_vec()));
        assert_eq!(bytes(KeyCode::Right, KeyModifiers::NONE), Some(b"\x1b[C".to_vec()));
        assert_eq!(bytes(KeyCode::Left, KeyModifiers::NONE), Some(b"\x1b[D".to_vec()));
        assert_eq!(bytes(KeyCode::Up, KeyModifiers::CONTROL), Some(b"\x1b[1;5A".to_vec()));
    }

    #[test]
    fn test_navigation_keys() {
        assert_eq!(bytes(KeyCode::Home, KeyModifiers::NONE), Some(b"\x1b[H".to_vec()));
        assert_eq!(bytes(KeyCode::End, KeyModifiers::SHIFT), Some(b"\x1b[1;2F".to_vec()));
        assert_eq!(bytes(KeyCode::PageUp, KeyModifiers::NONE), Some(b"\x1b[5~".to_vec()));
        assert_eq!(bytes(KeyCode::Delete, KeyModifiers::ALT), Some(b"\x1b[3;3~".to_vec()));
        assert_eq!(bytes(KeyCode::F(1), KeyModifiers::NONE), None);
    }

    #[test]
    fn test_ctrl_c() {
        let action = KeyMapper::map(&key_event(KeyCode::Char('c'), KeyModifiers::CONTROL));

        if cfg!(unix) {
            assert_eq!(action, Some(KeyAction::Interrupt));
        } else {
            assert_eq!(action, Some(KeyAction::Write(vec![0x03])));
        }
    }

    #[test]
    fn test_release_is_ignored() {
        let mut event = key_event(KeyCode::Char('a'), KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert_eq!(KeyMapper::map(&event), None);
    }
}
