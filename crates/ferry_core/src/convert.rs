//! Conversions between value representations.
//!
//! Slice accessors (`as_*`) hand out borrowed views and never allocate.
//! Allocating accessors (`to_text`, `to_cstring`, `to_utf16`) produce owned
//! copies. Numeric coercions never wrap: out-of-range results are errors.

use std::ffi::CString;

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::handle::ForeignHandle;
use crate::serial::Serialization;
use crate::value::Value;

const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

fn mismatch(expected: &'static str, got: &Value<'_>) -> Error {
    Error::type_mismatch(expected, got.type_name())
}

impl<'a> Value<'a> {
    pub fn as_bytes(&self) -> Result<&'a [u8]> {
        match *self {
            Value::String(b) => Ok(b),
            ref other => Err(mismatch("string", other)),
        }
    }

    /// The string bytes, validated as UTF-8.
    pub fn as_str(&self) -> Result<&'a str> {
        let bytes = self.as_bytes()?;
        std::str::from_utf8(bytes).map_err(|e| Error::Encoding(e.to_string()))
    }

    pub fn as_wide(&self) -> Result<&'a [u16]> {
        match *self {
            Value::WideString(w) => Ok(w),
            ref other => Err(mismatch("wide string", other)),
        }
    }

    pub fn as_handle(&self) -> Result<&'a ForeignHandle> {
        match *self {
            Value::ForeignHandle(h) => Ok(h),
            ref other => Err(mismatch("object", other)),
        }
    }

    pub fn as_serialization(&self) -> Result<&'a Serialization<'a>> {
        match *self {
            Value::SerializationRef(s) => Ok(s),
            ref other => Err(mismatch("structure", other)),
        }
    }

    /// Appends the textual form of an atomic value to `out`.
    pub fn write_text(&self, out: &mut String) -> Result<()> {
        match *self {
            Value::Double(d) => out.push_str(ryu::Buffer::new().format(d)),
            Value::UInt(u) => out.push_str(itoa::Buffer::new().format(u)),
            Value::Int(i) => out.push_str(itoa::Buffer::new().format(i)),
            Value::String(b) => {
                let s = std::str::from_utf8(b).map_err(|e| Error::Encoding(e.to_string()))?;
                out.try_reserve(s.len())?;
                out.push_str(s);
            }
            Value::WideString(w) => {
                out.try_reserve(w.len())?;
                for c in char::decode_utf16(w.iter().copied()) {
                    let c = c.map_err(|e| {
                        Error::Encoding(format!("unpaired surrogate {:#06x}", e.unpaired_surrogate()))
                    })?;
                    out.push(c);
                }
            }
            ref other => return Err(mismatch("string or number", other)),
        }
        Ok(())
    }

    /// Owned UTF-8 text of an atomic value.
    pub fn to_text(&self) -> Result<String> {
        let mut out = String::new();
        self.write_text(&mut out)?;
        Ok(out)
    }

    /// Owned NUL-terminated copy. Byte strings are copied as-is; an interior
    /// NUL cannot be represented and is an encoding error.
    pub fn to_cstring(&self) -> Result<CString> {
        let bytes = match *self {
            Value::String(b) => {
                let mut buf = Vec::new();
                buf.try_reserve_exact(b.len() + 1)?;
                buf.extend_from_slice(b);
                buf
            }
            _ => self.to_text()?.into_bytes(),
        };
        CString::new(bytes).map_err(|e| {
            Error::Encoding(format!("interior NUL at byte {}", e.nul_position()))
        })
    }

    pub fn to_utf16(&self) -> Result<Vec<u16>> {
        match *self {
            Value::WideString(w) => {
                let mut out = Vec::new();
                out.try_reserve_exact(w.len())?;
                out.extend_from_slice(w);
                Ok(out)
            }
            _ => Ok(self.to_text()?.encode_utf16().collect()),
        }
    }

    pub fn to_i64(&self) -> Result<i64> {
        match *self {
            Value::Int(i) => Ok(i),
            Value::UInt(u) => {
                i64::try_from(u).map_err(|_| Error::Overflow(format!("{u} does not fit in int")))
            }
            Value::Double(d) => f64_to_i64(d),
            Value::String(_) | Value::WideString(_) => match self.parse_number()? {
                Number::Int(i) => Ok(i),
                Number::UInt(u) => Value::UInt(u).to_i64(),
                Number::Double(d) => f64_to_i64(d),
            },
            ref other => Err(mismatch("number", other)),
        }
    }

    pub fn to_u64(&self) -> Result<u64> {
        match *self {
            Value::UInt(u) => Ok(u),
            Value::Int(i) => {
                u64::try_from(i).map_err(|_| Error::Range(format!("negative value {i} for uint")))
            }
            Value::Double(d) => f64_to_u64(d),
            Value::String(_) | Value::WideString(_) => match self.parse_number()? {
                Number::Int(i) => Value::Int(i).to_u64(),
                Number::UInt(u) => Ok(u),
                Number::Double(d) => f64_to_u64(d),
            },
            ref other => Err(mismatch("number", other)),
        }
    }

    pub fn to_f64(&self) -> Result<f64> {
        match *self {
            Value::Double(d) => Ok(d),
            Value::Int(i) => Ok(i as f64),
            Value::UInt(u) => Ok(u as f64),
            Value::String(_) | Value::WideString(_) => Ok(match self.parse_number()? {
                Number::Int(i) => i as f64,
                Number::UInt(u) => u as f64,
                Number::Double(d) => d,
            }),
            ref other => Err(mismatch("number", other)),
        }
    }

    /// Numbers are true iff non-zero. Text accepts `1/y/t`, `0/n/f`,
    /// `true/false/yes/no` (any case) or an integer.
    pub fn to_bool(&self) -> Result<bool> {
        match *self {
            Value::Double(d) => Ok(d != 0.0),
            Value::Int(i) => Ok(i != 0),
            Value::UInt(u) => Ok(u != 0),
            Value::String(_) | Value::WideString(_) => {
                let ascii = self.ascii_text()?;
                let t = ascii.trim_ascii();
                if t.len() == 1 {
                    match t[0].to_ascii_lowercase() {
                        b'1' | b'y' | b't' => return Ok(true),
                        b'0' | b'n' | b'f' => return Ok(false),
                        _ => {}
                    }
                }
                for (word, truth) in [("true", true), ("yes", true), ("false", false), ("no", false)] {
                    if t.eq_ignore_ascii_case(word.as_bytes()) {
                        return Ok(truth);
                    }
                }
                match parse_number(t)? {
                    Number::Int(i) => Ok(i != 0),
                    Number::UInt(u) => Ok(u != 0),
                    Number::Double(_) => {
                        Err(Error::Encoding(format!("{:?} is not a boolean", String::from_utf8_lossy(t))))
                    }
                }
            }
            ref other => Err(mismatch("boolean", other)),
        }
    }

    /// Classifies a value into one of the numeric variants. Text is parsed:
    /// negative integers become `Int`, integers above `i64::MAX` become
    /// `UInt`, decimals become `Double`.
    pub fn to_numeric(&self) -> Result<Value<'static>> {
        match *self {
            Value::Double(d) => Ok(Value::Double(d)),
            Value::Int(i) => Ok(Value::Int(i)),
            Value::UInt(u) => Ok(Value::UInt(u)),
            Value::String(_) | Value::WideString(_) => Ok(match self.parse_number()? {
                Number::Int(i) => Value::Int(i),
                Number::UInt(u) => Value::UInt(u),
                Number::Double(d) => Value::Double(d),
            }),
            ref other => Err(mismatch("number", other)),
        }
    }

    fn parse_number(&self) -> Result<Number> {
        parse_number(&self.ascii_text()?)
    }

    /// Textual value as ASCII bytes. Numeric grammar is pure ASCII, so wide
    /// strings are narrowed without a heap allocation in the common case.
    fn ascii_text(&self) -> Result<SmallVec<[u8; 64]>> {
        match *self {
            Value::String(b) => Ok(SmallVec::from_slice(b)),
            Value::WideString(w) => w
                .iter()
                .map(|&u| {
                    u8::try_from(u)
                        .ok()
                        .filter(u8::is_ascii)
                        .ok_or_else(|| Error::Encoding(format!("non-ASCII unit {u:#06x} in number")))
                })
                .collect(),
            ref other => Err(mismatch("string", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    UInt(u64),
    Double(f64),
}

/// `Some(true)` for the integer grammar, `Some(false)` for a decimal, `None`
/// for anything else.
fn scan_decimal(s: &[u8]) -> Option<bool> {
    let digits = |mut i: usize| {
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let mut i = usize::from(matches!(s.first(), Some(b'+' | b'-')));
    let int_end = digits(i);
    let int_digits = int_end - i;
    i = int_end;
    let mut integer = true;
    let mut frac_digits = 0;
    if s.get(i) == Some(&b'.') {
        integer = false;
        let frac_end = digits(i + 1);
        frac_digits = frac_end - (i + 1);
        i = frac_end;
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }
    if matches!(s.get(i), Some(b'e' | b'E')) {
        integer = false;
        i += 1;
        if matches!(s.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_end = digits(i);
        if exp_end == i {
            return None;
        }
        i = exp_end;
    }
    (i == s.len()).then_some(integer)
}

fn parse_number(raw: &[u8]) -> Result<Number> {
    let t = raw.trim_ascii();
    let Some(integer) = scan_decimal(t) else {
        return Err(Error::Encoding(format!(
            "{:?} is not a decimal number",
            String::from_utf8_lossy(t)
        )));
    };
    // scan_decimal only accepts ASCII.
    let text = std::str::from_utf8(t).map_err(|e| Error::Encoding(e.to_string()))?;
    if integer {
        let overflow = || Error::Overflow(format!("{text} does not fit in 64 bits"));
        if text.starts_with('-') {
            return text.parse::<i64>().map(Number::Int).map_err(|_| overflow());
        }
        let u = text.parse::<u64>().map_err(|_| overflow())?;
        return Ok(match i64::try_from(u) {
            Ok(i) => Number::Int(i),
            Err(_) => Number::UInt(u),
        });
    }
    let d = text
        .parse::<f64>()
        .map_err(|e| Error::Encoding(format!("{text:?}: {e}")))?;
    if !d.is_finite() {
        return Err(Error::Overflow(format!("{text} does not fit in a double")));
    }
    Ok(Number::Double(d))
}

fn f64_to_i64(d: f64) -> Result<i64> {
    let t = d.trunc();
    if t.is_nan() || !(-I64_BOUND..I64_BOUND).contains(&t) {
        return Err(Error::Overflow(format!("{d} does not fit in int")));
    }
    Ok(t as i64)
}

fn f64_to_u64(d: f64) -> Result<u64> {
    let t = d.trunc();
    if t.is_nan() {
        return Err(Error::Overflow("NaN does not fit in uint".into()));
    }
    if t < 0.0 {
        return Err(Error::Range(format!("negative value {d} for uint")));
    }
    if t >= U64_BOUND {
        return Err(Error::Overflow(format!("{d} does not fit in uint")));
    }
    Ok(t as u64)
}
