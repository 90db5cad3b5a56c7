//! Single code point UTF-8 decoding

/// Result of decoding the code point at the start of a byte slice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A complete character and the number of bytes it used
    Char(char, usize),
    /// The slice ends before the sequence does
    Incomplete,
    /// Not a valid sequence; skip one byte
    Invalid,
}

/// Length of the sequence introduced by `lead`, if it is a valid lead byte
pub fn sequence_len(lead: u8) -> Option<usize> {
    if lead & 0x80 == 0 {
        Some(1)
    } else if lead & 0xE0 == 0xC0 {
        Some(2)
    } else if lead & 0xF0 == 0xE0 {
        Some(3)
    } else if lead & 0xF8 == 0xF0 {
        Some(4)
    } else {
        None
    }
}

pub fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// Decode one code point from the start of `bytes`
pub fn decode(bytes: &[u8]) -> Decoded {
    let Some(&lead) = bytes.first() else {
        return Decoded::Incomplete;
    };
    let Some(len) = sequence_len(lead) else {
        return Decoded::Invalid;
    };

    if bytes.len() < len {
        return if bytes[1..].iter().all(|&b| is_continuation(b)) {
            Decoded::Incomplete
        } else {
            Decoded::Invalid
        };
    }

    match std::str::from_utf8(&bytes[..len]) {
        Ok(s) => match s.chars().next() {
            Some(ch) => Decoded::Char(ch, len),
            None => Decoded::Invalid,
        },
        Err(_) => Decoded::Invalid,
    }
}
