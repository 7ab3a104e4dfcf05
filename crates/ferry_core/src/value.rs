//! The tagged scalar every binding agrees on.
//!
//! A [`Value`] is a plain tagged union. Its textual, handle and serialization
//! variants are borrowed views, so a `Value<'a>` can never outlive the argument
//! array, stack frame, stream or call outcome it was taken from. Copying a
//! `Value` never copies string bytes and no method here allocates.

use std::cmp::Ordering;
use std::ffi::{CStr, c_char};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::handle::{ClassId, ForeignHandle};
use crate::serial::Serialization;

/// Variant discriminant, numbered the way host glue sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueType {
    Void = 0,
    Double = 1,
    UInt = 2,
    Int = 3,
    String = 4,
    WideString = 5,
    ForeignHandle = 6,
    Serialization = 7,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Void => "void",
            ValueType::Double => "double",
            ValueType::UInt => "uint",
            ValueType::Int => "int",
            ValueType::String => "string",
            ValueType::WideString => "wide string",
            ValueType::ForeignHandle => "object",
            ValueType::Serialization => "structure",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Double | ValueType::UInt | ValueType::Int)
    }

    pub fn is_textual(self) -> bool {
        matches!(self, ValueType::String | ValueType::WideString)
    }
}

#[derive(Clone, Copy, Default)]
pub enum Value<'a> {
    #[default]
    Void,
    Double(f64),
    UInt(u64),
    Int(i64),
    /// Byte string, usually UTF-8. May contain NUL bytes.
    String(&'a [u8]),
    /// UTF-16 code units in machine byte order.
    WideString(&'a [u16]),
    ForeignHandle(&'a ForeignHandle),
    SerializationRef(&'a Serialization<'a>),
}

impl<'a> Value<'a> {
    pub const VOID: Value<'static> = Value::Void;

    /// String view with an explicit byte length. This is the primary string
    /// constructor; the bytes need no terminator and may contain NULs.
    #[inline]
    pub fn string(bytes: &'a [u8]) -> Self {
        Value::String(bytes)
    }

    #[inline]
    pub fn str(s: &'a str) -> Self {
        Value::String(s.as_bytes())
    }

    #[inline]
    pub fn wide(units: &'a [u16]) -> Self {
        Value::WideString(units)
    }

    #[inline]
    pub fn handle(handle: &'a ForeignHandle) -> Self {
        Value::ForeignHandle(handle)
    }

    #[inline]
    pub fn serialization(ser: &'a Serialization<'a>) -> Self {
        Value::SerializationRef(ser)
    }

    /// String view of a C string. The length is known up front.
    #[inline]
    pub fn from_cstr(s: &'a CStr) -> Self {
        Value::String(s.to_bytes())
    }

    /// String view whose length is found by scanning for a NUL terminator.
    ///
    /// Convenience wrapper over [`Value::string`] for host APIs that only hand
    /// out C strings. Prefer the explicit-length constructor whenever the
    /// length is known.
    ///
    /// # Safety
    ///
    /// `ptr` must be non-null and point to a NUL-terminated byte sequence that
    /// stays valid and unmodified for `'a`. A buffer without a terminator is
    /// read past its end.
    pub unsafe fn from_nul_terminated(ptr: *const c_char) -> Self {
        // SAFETY: forwarded from the caller's contract.
        let s = unsafe { CStr::from_ptr(ptr) };
        Value::String(s.to_bytes())
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Void => ValueType::Void,
            Value::Double(_) => ValueType::Double,
            Value::UInt(_) => ValueType::UInt,
            Value::Int(_) => ValueType::Int,
            Value::String(_) => ValueType::String,
            Value::WideString(_) => ValueType::WideString,
            Value::ForeignHandle(_) => ValueType::ForeignHandle,
            Value::SerializationRef(_) => ValueType::Serialization,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        !self.is_void()
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        self.value_type().is_numeric()
    }

    #[inline]
    pub fn is_textual(&self) -> bool {
        self.value_type().is_textual()
    }

    /// Numeric or textual: values that can be converted to a scalar.
    #[inline]
    pub fn is_atomic(&self) -> bool {
        self.is_numeric() || self.is_textual()
    }

    /// Length in code units for the textual variants.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::String(b) => Some(b.len()),
            Value::WideString(w) => Some(w.len()),
            _ => None,
        }
    }

    pub fn class_id(&self) -> Option<ClassId> {
        match self {
            Value::ForeignHandle(h) => Some(h.class_id()),
            _ => None,
        }
    }
}

impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value<'_> {}

impl PartialOrd for Value<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Void, Value::Void) => Ordering::Equal,
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::UInt(a), Value::UInt(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::WideString(a), Value::WideString(b)) => a.cmp(b),
            (Value::ForeignHandle(a), Value::ForeignHandle(b)) => a
                .class_id()
                .cmp(&b.class_id())
                .then_with(|| a.addr().cmp(&b.addr())),
            (Value::SerializationRef(a), Value::SerializationRef(b)) => a.nodes().cmp(b.nodes()),
            _ => self.value_type().cmp(&other.value_type()),
        }
    }
}

impl Hash for Value<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.value_type() as u8);
        match self {
            Value::Void => {}
            Value::Double(d) => state.write_u64(d.to_bits()),
            Value::UInt(u) => state.write_u64(*u),
            Value::Int(i) => state.write_i64(*i),
            Value::String(b) => b.hash(state),
            Value::WideString(w) => w.hash(state),
            Value::ForeignHandle(h) => {
                h.class_id().hash(state);
                state.write_usize(h.addr());
            }
            Value::SerializationRef(s) => {
                for node in s.nodes() {
                    node.hash(state);
                }
            }
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "Void"),
            Value::Double(d) => write!(f, "Double({d:?})"),
            Value::UInt(u) => write!(f, "UInt({u})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::String(b) => write!(f, "String({:?})", String::from_utf8_lossy(b)),
            Value::WideString(w) => write!(f, "WideString({:?})", String::from_utf16_lossy(w)),
            Value::ForeignHandle(h) => write!(f, "ForeignHandle(class={})", h.class_id()),
            Value::SerializationRef(s) => write!(f, "SerializationRef({} nodes)", s.len()),
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("()"),
            Value::Double(d) => {
                let mut buf = ryu::Buffer::new();
                f.write_str(buf.format(*d))
            }
            Value::UInt(u) => {
                let mut buf = itoa::Buffer::new();
                f.write_str(buf.format(*u))
            }
            Value::Int(i) => {
                let mut buf = itoa::Buffer::new();
                f.write_str(buf.format(*i))
            }
            Value::String(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::WideString(w) => {
                for c in char::decode_utf16(w.iter().copied()) {
                    write!(f, "{}", c.unwrap_or(char::REPLACEMENT_CHARACTER))?;
                }
                Ok(())
            }
            Value::ForeignHandle(h) => write!(f, "<object #{}>", h.class_id()),
            Value::SerializationRef(s) => write!(f, "<structure {} nodes>", s.len()),
        }
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value<'_> {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u64> for Value<'_> {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<u32> for Value<'_> {
    fn from(v: u32) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

/// Booleans travel as `UInt(0 | 1)`; the closed variant set has no bool.
impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Value::UInt(v as u64)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::str(v)
    }
}

impl<'a> From<&'a String> for Value<'a> {
    fn from(v: &'a String) -> Self {
        Value::str(v.as_str())
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(v: &'a [u8]) -> Self {
        Value::String(v)
    }
}

impl<'a> From<&'a [u16]> for Value<'a> {
    fn from(v: &'a [u16]) -> Self {
        Value::WideString(v)
    }
}

impl<'a> From<&'a ForeignHandle> for Value<'a> {
    fn from(v: &'a ForeignHandle) -> Self {
        Value::ForeignHandle(v)
    }
}

impl<'a> From<&'a Serialization<'a>> for Value<'a> {
    fn from(v: &'a Serialization<'a>) -> Self {
        Value::SerializationRef(v)
    }
}
