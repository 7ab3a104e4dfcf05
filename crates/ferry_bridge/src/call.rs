//! The boundary call convention.
//!
//! Generated glue calls one of [`call_function`], [`call_method`] or
//! [`call_constructor`] with the raw argument array. The native body works
//! with ordinary `Result`s; whatever it returns, including a panic, ends up
//! in the returned [`CallOutcome`]. Nothing unwinds into host frames.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use ferry_core::host::EncodeConfig;
use ferry_core::{Encoding, Error, ForeignClass, ForeignHandle, Result, Serialization, Tree, Value, text};

use crate::outcome::CallOutcome;
use crate::registry;

/// Borrowed view of a call's argument array with typed accessors.
#[derive(Clone, Copy, Debug)]
pub struct Args<'v, 'a> {
    argv: &'v [Value<'a>],
}

impl<'v, 'a> Args<'v, 'a> {
    pub fn new(argv: &'v [Value<'a>]) -> Self {
        Self { argv }
    }

    pub fn len(&self) -> usize {
        self.argv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    pub fn as_slice(&self) -> &'v [Value<'a>] {
        self.argv
    }

    /// Checks the argument count; `max` may be `usize::MAX` for variadics.
    pub fn expect(&self, min: usize, max: usize) -> Result<()> {
        let actual = self.argv.len();
        if actual < min || actual > max {
            return Err(Error::NofArgs { min, max, actual });
        }
        Ok(())
    }

    pub fn get(&self, i: usize) -> Result<Value<'a>> {
        self.argv.get(i).copied().ok_or(Error::NofArgs {
            min: i + 1,
            max: usize::MAX,
            actual: self.argv.len(),
        })
    }

    /// A trailing optional argument: missing and void are both `None`.
    pub fn optional(&self, i: usize) -> Option<Value<'a>> {
        self.argv.get(i).copied().filter(Value::is_defined)
    }

    pub fn i64(&self, i: usize) -> Result<i64> {
        self.get(i)?.to_i64()
    }

    pub fn u64(&self, i: usize) -> Result<u64> {
        self.get(i)?.to_u64()
    }

    pub fn f64(&self, i: usize) -> Result<f64> {
        self.get(i)?.to_f64()
    }

    pub fn bool(&self, i: usize) -> Result<bool> {
        self.get(i)?.to_bool()
    }

    /// Borrowed UTF-8 text. Wide strings need [`text`](Self::text).
    pub fn str(&self, i: usize) -> Result<&'a str> {
        self.get(i)?.as_str()
    }

    /// Owned text of any atomic argument.
    pub fn text(&self, i: usize) -> Result<String> {
        self.get(i)?.to_text()
    }

    /// Owned text of an argument whose byte string is in `enc`, for hosts
    /// that hand strings over in their own encoding.
    pub fn text_in(&self, i: usize, enc: Encoding) -> Result<String> {
        match self.get(i)? {
            Value::String(b) => text::decode(b, enc),
            other => other.to_text(),
        }
    }

    pub fn serialization(&self, i: usize) -> Result<&'a Serialization<'a>> {
        self.get(i)?.as_serialization()
    }

    pub fn handle(&self, i: usize) -> Result<&'a ForeignHandle> {
        self.get(i)?.as_handle()
    }

    /// A native object previously handed out as a handle.
    pub fn object<T: ForeignClass>(&self, i: usize) -> Result<&'a T> {
        let h = self.handle(i)?;
        check_class::<T>(h)?;
        h.get::<T>()?
            .ok_or(Error::type_mismatch(T::CLASS_NAME, "closed object"))
    }
}

fn check_class<T: ForeignClass>(h: &ForeignHandle) -> Result<()> {
    if h.class_id() != T::CLASS_ID {
        return Err(Error::type_mismatch(T::CLASS_NAME, registry::class_name(h.class_id())));
    }
    Ok(())
}

/// Wraps a native object so it is returned as a new owning handle.
pub struct Owned<T: ForeignClass>(pub T);

/// Types a native call can return.
pub trait IntoOutcome {
    fn into_outcome(self, out: &mut CallOutcome) -> Result<()>;
}

impl IntoOutcome for () {
    fn into_outcome(self, out: &mut CallOutcome) -> Result<()> {
        out.set_void();
        Ok(())
    }
}

macro_rules! setter_outcome {
    ($($t:ty => $set:ident as $cast:ty),* $(,)?) => {
        $(
            impl IntoOutcome for $t {
                fn into_outcome(self, out: &mut CallOutcome) -> Result<()> {
                    out.$set(self as $cast);
                    Ok(())
                }
            }
        )*
    };
}

setter_outcome! {
    i64 => set_int as i64,
    i32 => set_int as i64,
    u64 => set_uint as u64,
    u32 => set_uint as u64,
    usize => set_uint as u64,
    f64 => set_double as f64,
}

impl IntoOutcome for bool {
    fn into_outcome(self, out: &mut CallOutcome) -> Result<()> {
        out.set_bool(self);
        Ok(())
    }
}

impl IntoOutcome for String {
    fn into_outcome(self, out: &mut CallOutcome) -> Result<()> {
        out.set_string(self);
        Ok(())
    }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self, out: &mut CallOutcome) -> Result<()> {
        out.set_static_string(self);
        Ok(())
    }
}

impl IntoOutcome for Vec<u16> {
    fn into_outcome(self, out: &mut CallOutcome) -> Result<()> {
        out.set_wide(self);
        Ok(())
    }
}

impl IntoOutcome for Serialization<'static> {
    fn into_outcome(self, out: &mut CallOutcome) -> Result<()> {
        out.set_serialization(self)
    }
}

impl IntoOutcome for Tree {
    fn into_outcome(self, out: &mut CallOutcome) -> Result<()> {
        out.set_host(&self, EncodeConfig::default())
    }
}

impl IntoOutcome for ForeignHandle {
    fn into_outcome(self, out: &mut CallOutcome) -> Result<()> {
        out.set_handle(self);
        Ok(())
    }
}

impl<T: ForeignClass> IntoOutcome for Owned<T> {
    fn into_outcome(self, out: &mut CallOutcome) -> Result<()> {
        out.set_handle(ForeignHandle::owning(Box::new(self.0)));
        Ok(())
    }
}

impl<R: IntoOutcome> IntoOutcome for Option<R> {
    fn into_outcome(self, out: &mut CallOutcome) -> Result<()> {
        match self {
            Some(r) => r.into_outcome(out),
            None => {
                out.set_void();
                Ok(())
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "native code panicked"
    }
}

fn run<R, F>(target: &str, body: F) -> CallOutcome
where
    R: IntoOutcome,
    F: FnOnce() -> Result<R>,
{
    let mut out = CallOutcome::new();
    let res = panic::catch_unwind(AssertUnwindSafe(|| body().and_then(|r| r.into_outcome(&mut out))));
    match res {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::debug!(target: "ferry::bridge", call = target, kind = ?e.kind(), error = %e, "call failed");
            out.report(&e);
        }
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            tracing::warn!(target: "ferry::bridge", call = target, panic = msg, "panic caught at call boundary");
            out.report_error(format_args!("internal error in {target}: {msg}"));
        }
    }
    out
}

/// Calls a free function.
pub fn call_function<R, F>(name: &str, argv: &[Value<'_>], f: F) -> CallOutcome
where
    R: IntoOutcome,
    F: FnOnce(Args<'_, '_>) -> Result<R>,
{
    run(name, || f(Args::new(argv)))
}

/// Calls a method on the object behind `self_handle`.
///
/// A missing self or a closed (null) object is `MissingSelf`; an object of
/// another class is a `TypeMismatch`.
pub fn call_method<T, R, F>(
    name: &str,
    self_handle: Option<&ForeignHandle>,
    argv: &[Value<'_>],
    f: F,
) -> CallOutcome
where
    T: ForeignClass,
    R: IntoOutcome,
    F: FnOnce(&T, Args<'_, '_>) -> Result<R>,
{
    run(name, || {
        let h = self_handle.ok_or(Error::MissingSelf)?;
        check_class::<T>(h)?;
        let this = h.get::<T>()?.ok_or(Error::MissingSelf)?;
        f(this, Args::new(argv))
    })
}

/// Builds a new native object and returns it as an owning handle.
pub fn call_constructor<T, F>(argv: &[Value<'_>], f: F) -> CallOutcome
where
    T: ForeignClass,
    F: FnOnce(Args<'_, '_>) -> Result<T>,
{
    run(T::CLASS_NAME, || f(Args::new(argv)).map(Owned))
}
