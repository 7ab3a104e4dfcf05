//! The value-or-error bundle returned from every boundary call.

use std::borrow::Cow;
use std::ffi::{CStr, c_char};
use std::fmt::{self, Write as _};

use ferry_core::host::{self, EncodeConfig, HostValue};
use ferry_core::{Encoding, Error, ForeignHandle, Result, Serialization, Value, text};

/// Capacity of the error message buffer in bytes, NUL terminator included.
pub const MAX_ERROR_MESSAGE_SIZE: usize = 2048;

const UNKNOWN_ERROR: &str = "unknown error";
const UNFINISHED_STRUCTURE: &str = "result structure is not finished";

/// Fixed-size, always NUL-terminated error message.
///
/// Writing never allocates and never overruns: messages are cut at
/// `MAX_ERROR_MESSAGE_SIZE - 1` bytes on a character boundary. The buffer
/// holds an error iff its first byte is non-zero, so interior NULs are
/// written as spaces and an empty message becomes `"unknown error"`.
#[repr(C)]
pub struct ErrorBuffer {
    buf: [u8; MAX_ERROR_MESSAGE_SIZE],
}

struct BufWriter<'b> {
    buf: &'b mut [u8; MAX_ERROR_MESSAGE_SIZE],
    len: usize,
    truncated: bool,
}

impl fmt::Write for BufWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.truncated {
            return Ok(());
        }
        let room = MAX_ERROR_MESSAGE_SIZE - 1 - self.len;
        let mut take = s.len().min(room);
        if take < s.len() {
            self.truncated = true;
            while !s.is_char_boundary(take) {
                take -= 1;
            }
        }
        let dst = &mut self.buf[self.len..self.len + take];
        for (d, &b) in dst.iter_mut().zip(&s.as_bytes()[..take]) {
            *d = if b == 0 { b' ' } else { b };
        }
        self.len += take;
        Ok(())
    }
}

impl ErrorBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_ERROR_MESSAGE_SIZE],
        }
    }

    #[inline]
    pub fn has_error(&self) -> bool {
        self.buf[0] != 0
    }

    pub fn clear(&mut self) {
        self.buf[0] = 0;
    }

    pub fn report_error(&mut self, args: fmt::Arguments<'_>) {
        let mut w = BufWriter {
            buf: &mut self.buf,
            len: 0,
            truncated: false,
        };
        // BufWriter never fails; a failing Display impl just ends the message early.
        let _ = w.write_fmt(args);
        if w.len == 0 {
            let _ = w.write_str(UNKNOWN_ERROR);
        }
        let end = w.len;
        self.buf[end] = 0;
    }

    pub fn report(&mut self, err: &Error) {
        self.report_error(format_args!("{err}"));
    }

    /// Message length in bytes, excluding the terminator.
    pub fn len(&self) -> usize {
        self.buf.iter().position(|&b| b == 0).unwrap_or(MAX_ERROR_MESSAGE_SIZE - 1)
    }

    pub fn is_empty(&self) -> bool {
        !self.has_error()
    }

    /// The message, empty when there is no error.
    pub fn last_error(&self) -> &str {
        let bytes = &self.buf[..self.len()];
        match std::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
        }
    }

    pub fn last_error_cstr(&self) -> &CStr {
        CStr::from_bytes_until_nul(&self.buf).unwrap_or_default()
    }

    /// The raw buffer, for host glue that copies the message out.
    pub fn as_ptr(&self) -> *const c_char {
        self.buf.as_ptr().cast()
    }
}

impl Default for ErrorBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorBuffer").field(&self.last_error()).finish()
    }
}

#[derive(Debug, Default)]
enum Payload {
    #[default]
    Void,
    Double(f64),
    UInt(u64),
    Int(i64),
    Text(Cow<'static, [u8]>),
    Wide(Vec<u16>),
    /// The result is `CallOutcome::stream`.
    Serialization,
    Handle(ForeignHandle),
}

/// Result of one call: a value that owns whatever it points at, or an error.
///
/// Check [`has_error`](Self::has_error) first; [`value`](Self::value) yields
/// nothing while an error is set.
#[derive(Debug, Default)]
pub struct CallOutcome {
    payload: Payload,
    stream: Serialization<'static>,
    error: ErrorBuffer,
}

impl CallOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_error(err: &Error) -> Self {
        let mut out = Self::new();
        out.report(err);
        out
    }

    /// `None` while an error is set, or while a structure built in place
    /// through [`serialization`](Self::serialization) is still open.
    pub fn value(&self) -> Option<Value<'_>> {
        if self.error.has_error() {
            return None;
        }
        if matches!(self.payload, Payload::Serialization) && !self.stream.is_complete() {
            return None;
        }
        Some(match &self.payload {
            Payload::Void => Value::Void,
            Payload::Double(d) => Value::Double(*d),
            Payload::UInt(u) => Value::UInt(*u),
            Payload::Int(i) => Value::Int(*i),
            Payload::Text(t) => Value::String(t),
            Payload::Wide(w) => Value::WideString(w),
            Payload::Serialization => Value::SerializationRef(&self.stream),
            Payload::Handle(h) => Value::ForeignHandle(h),
        })
    }

    /// Native-side view: the value, or the reported message.
    pub fn result(&self) -> std::result::Result<Value<'_>, &str> {
        self.value().ok_or_else(|| self.failure())
    }

    pub fn into_result(self) -> std::result::Result<Self, String> {
        match self.value() {
            Some(_) => Ok(self),
            None => Err(self.failure().to_owned()),
        }
    }

    fn failure(&self) -> &str {
        if self.error.has_error() {
            self.error.last_error()
        } else {
            UNFINISHED_STRUCTURE
        }
    }

    fn replace(&mut self, payload: Payload) {
        self.stream.clear();
        self.payload = payload;
    }

    pub fn set_void(&mut self) {
        self.replace(Payload::Void);
    }

    pub fn set_int(&mut self, v: i64) {
        self.replace(Payload::Int(v));
    }

    pub fn set_uint(&mut self, v: u64) {
        self.replace(Payload::UInt(v));
    }

    pub fn set_double(&mut self, v: f64) {
        self.replace(Payload::Double(v));
    }

    pub fn set_bool(&mut self, v: bool) {
        self.replace(Payload::UInt(v as u64));
    }

    pub fn set_string(&mut self, s: String) {
        self.replace(Payload::Text(Cow::Owned(s.into_bytes())));
    }

    pub fn set_bytes(&mut self, b: Vec<u8>) {
        self.replace(Payload::Text(Cow::Owned(b)));
    }

    /// Text converted to the byte encoding the host expects.
    pub fn set_encoded(&mut self, s: &str, enc: Encoding) {
        self.set_bytes(text::encode(s, enc));
    }

    pub fn set_static_string(&mut self, s: &'static str) {
        self.replace(Payload::Text(Cow::Borrowed(s.as_bytes())));
    }

    pub fn set_wide(&mut self, w: Vec<u16>) {
        self.replace(Payload::Wide(w));
    }

    pub fn set_handle(&mut self, h: ForeignHandle) {
        self.replace(Payload::Handle(h));
    }

    /// Takes a complete stream as the result. An unfinished one is rejected
    /// and the previous result kept.
    pub fn set_serialization(&mut self, s: Serialization<'static>) -> Result<()> {
        s.finish()?;
        self.stream = s;
        self.payload = Payload::Serialization;
        Ok(())
    }

    /// The result stream, for building in place. Replaces any other result.
    /// [`value`](Self::value) yields it only once it is complete.
    pub fn serialization(&mut self) -> &mut Serialization<'static> {
        if !matches!(self.payload, Payload::Serialization) {
            self.replace(Payload::Serialization);
        }
        &mut self.stream
    }

    /// Encodes a host structure as the result.
    pub fn set_host<V: HostValue + ?Sized>(&mut self, v: &V, config: EncodeConfig) -> Result<()> {
        let s = host::encode(v, config)?;
        self.set_serialization(s)
    }

    /// Stores a copy of any value, so the result does not borrow from the
    /// call's arguments.
    pub fn set_copied(&mut self, v: Value<'_>) -> Result<()> {
        match v {
            Value::Void => self.set_void(),
            Value::Double(d) => self.set_double(d),
            Value::UInt(u) => self.set_uint(u),
            Value::Int(i) => self.set_int(i),
            Value::String(b) => {
                let mut owned = Vec::new();
                owned.try_reserve_exact(b.len())?;
                owned.extend_from_slice(b);
                self.set_bytes(owned);
            }
            Value::WideString(w) => {
                let mut owned = Vec::new();
                owned.try_reserve_exact(w.len())?;
                owned.extend_from_slice(w);
                self.set_wide(owned);
            }
            Value::ForeignHandle(h) => self.set_handle(h.clone()),
            Value::SerializationRef(s) => {
                let mut owned = Serialization::new();
                owned.append_copied(s)?;
                self.set_serialization(owned)?;
            }
        }
        Ok(())
    }

    /// Records an error. Any result set so far is discarded.
    pub fn report_error(&mut self, args: fmt::Arguments<'_>) {
        self.replace(Payload::Void);
        self.error.report_error(args);
    }

    pub fn report(&mut self, err: &Error) {
        self.replace(Payload::Void);
        self.error.report(err);
    }

    pub fn has_error(&self) -> bool {
        self.error.has_error()
    }

    pub fn last_error(&self) -> &str {
        self.error.last_error()
    }

    pub fn last_error_cstr(&self) -> &CStr {
        self.error.last_error_cstr()
    }

    pub fn clear_error(&mut self) {
        self.error.clear();
    }

    pub fn error_buffer(&self) -> &ErrorBuffer {
        &self.error
    }
}
