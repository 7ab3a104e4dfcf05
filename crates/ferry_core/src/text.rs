//! Character encodings host runtimes hand strings over in.
//!
//! The protocol itself carries UTF-8 bytes and machine-order UTF-16; adapters
//! for runtimes with other internal representations convert through here.

use crate::error::{Error, Result};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    /// UTF-16 in machine byte order.
    Utf16,
    Utf32Le,
    Utf32Be,
    /// UTF-32 in machine byte order.
    Utf32,
}

impl Encoding {
    /// Bytes per code unit.
    pub fn unit_size(self) -> usize {
        match self {
            Encoding::Utf8 => 1,
            Encoding::Utf16Le | Encoding::Utf16Be | Encoding::Utf16 => 2,
            Encoding::Utf32Le | Encoding::Utf32Be | Encoding::Utf32 => 4,
        }
    }

    fn layout(self) -> Layout {
        let big = cfg!(target_endian = "big");
        match self {
            Encoding::Utf8 => Layout::Utf8,
            Encoding::Utf16Le => Layout::Utf16 { big: false },
            Encoding::Utf16Be => Layout::Utf16 { big: true },
            Encoding::Utf16 => Layout::Utf16 { big },
            Encoding::Utf32Le => Layout::Utf32 { big: false },
            Encoding::Utf32Be => Layout::Utf32 { big: true },
            Encoding::Utf32 => Layout::Utf32 { big },
        }
    }
}

enum Layout {
    Utf8,
    Utf16 { big: bool },
    Utf32 { big: bool },
}

/// Decodes `bytes` in `enc` into an owned UTF-8 string.
pub fn decode(bytes: &[u8], enc: Encoding) -> Result<String> {
    let unit = enc.unit_size();
    if bytes.len() % unit != 0 {
        return Err(Error::Encoding(format!(
            "{} bytes is not a whole number of {unit}-byte units",
            bytes.len()
        )));
    }
    match enc.layout() {
        Layout::Utf8 => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| Error::Encoding(e.to_string())),
        Layout::Utf16 { big } => decode_utf16_units(bytes.chunks_exact(2).map(|c| {
            let b = [c[0], c[1]];
            if big { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) }
        })),
        Layout::Utf32 { big } => decode_utf32_units(bytes.chunks_exact(4).map(|c| {
            let b = [c[0], c[1], c[2], c[3]];
            if big { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) }
        })),
    }
}

/// Encodes `s` into `enc`. Never fails: every `str` is representable.
pub fn encode(s: &str, enc: Encoding) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() * enc.unit_size());
    match enc.layout() {
        Layout::Utf8 => out.extend_from_slice(s.as_bytes()),
        Layout::Utf16 { big } => {
            for u in s.encode_utf16() {
                out.extend_from_slice(&if big { u.to_be_bytes() } else { u.to_le_bytes() });
            }
        }
        Layout::Utf32 { big } => {
            for c in s.chars() {
                let u = c as u32;
                out.extend_from_slice(&if big { u.to_be_bytes() } else { u.to_le_bytes() });
            }
        }
    }
    out
}

fn decode_utf16_units(units: impl Iterator<Item = u16>) -> Result<String> {
    let mut out = String::new();
    for (i, c) in char::decode_utf16(units).enumerate() {
        match c {
            Ok(c) => out.push(c),
            Err(e) => {
                return Err(Error::Encoding(format!(
                    "unpaired surrogate {:#06x} at unit {i}",
                    e.unpaired_surrogate()
                )));
            }
        }
    }
    Ok(out)
}

fn decode_utf32_units(units: impl Iterator<Item = u32>) -> Result<String> {
    let mut out = String::new();
    for (i, u) in units.enumerate() {
        let c = char::from_u32(u)
            .ok_or_else(|| Error::Encoding(format!("invalid code point {u:#x} at unit {i}")))?;
        out.push(c);
    }
    Ok(out)
}

pub fn utf16_to_string(units: &[u16]) -> Result<String> {
    decode_utf16_units(units.iter().copied())
}

pub fn str_to_utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Compares a textual value with an ASCII literal without allocating.
pub fn eq_ascii(value: &Value<'_>, ascii: &str) -> bool {
    match value {
        Value::String(b) => *b == ascii.as_bytes(),
        Value::WideString(w) => {
            w.len() == ascii.len() && w.iter().zip(ascii.bytes()).all(|(&u, b)| u == b as u16)
        }
        _ => false,
    }
}
