//! Building a [`Serialization`] from host-language structures.
//!
//! Host adapters implement [`HostValue`] for their runtime's dynamic value
//! type and let an [`Encoder`] walk it. Host structures can be arbitrarily
//! deep and even cyclic, so the walk is capped by
//! [`EncodeConfig::max_depth`] and containers that report an identity are
//! tracked along the active path.

use smallvec::SmallVec;

use crate::error::{Result, StructureError};
use crate::serial::Serialization;
use crate::value::Value;

pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeConfig {
    /// Maximum number of nested containers.
    pub max_depth: usize,
    /// Reject a container that (transitively) contains itself instead of
    /// running into the depth limit.
    pub detect_cycles: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            detect_cycles: true,
        }
    }
}

/// A host-language value that can describe itself to an [`Encoder`].
pub trait HostValue {
    /// A stable identity (typically the address of a shared container) used
    /// for cycle detection. Values that cannot be shared return `None`.
    fn identity(&self) -> Option<usize> {
        None
    }

    fn encode(&self, enc: &mut Encoder<'_, '_>) -> Result<()>;
}

pub struct Encoder<'s, 'a> {
    out: &'s mut Serialization<'a>,
    config: EncodeConfig,
    depth: usize,
    path: SmallVec<[usize; 16]>,
}

impl<'s, 'a> Encoder<'s, 'a> {
    pub fn new(out: &'s mut Serialization<'a>, config: EncodeConfig) -> Self {
        Self {
            out,
            config,
            depth: 0,
            path: SmallVec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Encodes a nested host value.
    pub fn value<V: HostValue + ?Sized>(&mut self, v: &V) -> Result<()> {
        let id = if self.config.detect_cycles {
            v.identity()
        } else {
            None
        };
        if let Some(id) = id {
            if self.path.contains(&id) {
                tracing::debug!(target: "ferry::serial", identity = id, depth = self.depth, "cyclic host structure");
                return Err(StructureError::Cycle.into());
            }
            self.path.push(id);
        }
        let res = v.encode(self);
        if id.is_some() {
            self.path.pop();
        }
        res
    }

    /// A scalar. Text is copied into the stream.
    pub fn item(&mut self, v: Value<'_>) -> Result<()> {
        self.out.push_item_copied(v)
    }

    pub fn name(&mut self, v: Value<'_>) -> Result<()> {
        self.out.push_name_copied(v)
    }

    pub fn open(&mut self) -> Result<()> {
        if self.depth >= self.config.max_depth {
            tracing::debug!(target: "ferry::serial", limit = self.config.max_depth, "host structure nested too deeply");
            return Err(StructureError::TooDeep {
                limit: self.config.max_depth,
            }
            .into());
        }
        self.out.open()?;
        self.depth += 1;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.out.close()?;
        self.depth -= 1;
        Ok(())
    }

    /// A positional container.
    pub fn list<'v, V: HostValue + 'v>(&mut self, items: impl IntoIterator<Item = &'v V>) -> Result<()> {
        self.open()?;
        for item in items {
            self.value(item)?;
        }
        self.close()
    }

    /// A labeled container.
    pub fn map<'v, V: HostValue + 'v>(
        &mut self,
        entries: impl IntoIterator<Item = (Value<'v>, &'v V)>,
    ) -> Result<()> {
        self.open()?;
        for (name, v) in entries {
            self.name(name)?;
            self.value(v)?;
        }
        self.close()
    }
}

/// Encodes `v` into a stream that owns all of its text.
pub fn encode<V: HostValue + ?Sized>(v: &V, config: EncodeConfig) -> Result<Serialization<'static>> {
    let mut out = Serialization::new();
    Encoder::new(&mut out, config).value(v)?;
    out.finish()?;
    Ok(out)
}

macro_rules! scalar_host_value {
    ($($t:ty),*) => {
        $(
            impl HostValue for $t {
                fn encode(&self, enc: &mut Encoder<'_, '_>) -> Result<()> {
                    enc.item(Value::from(*self))
                }
            }
        )*
    };
}

scalar_host_value!(i64, i32, u64, u32, f64, bool);

impl HostValue for str {
    fn encode(&self, enc: &mut Encoder<'_, '_>) -> Result<()> {
        enc.item(Value::str(self))
    }
}

impl HostValue for String {
    fn encode(&self, enc: &mut Encoder<'_, '_>) -> Result<()> {
        enc.item(Value::str(self))
    }
}

impl HostValue for Value<'_> {
    fn encode(&self, enc: &mut Encoder<'_, '_>) -> Result<()> {
        enc.item(*self)
    }
}

impl<T: HostValue> HostValue for Option<T> {
    fn encode(&self, enc: &mut Encoder<'_, '_>) -> Result<()> {
        match self {
            Some(v) => enc.value(v),
            None => enc.item(Value::Void),
        }
    }
}

impl<T: HostValue> HostValue for [T] {
    fn encode(&self, enc: &mut Encoder<'_, '_>) -> Result<()> {
        enc.list(self)
    }
}

impl<T: HostValue> HostValue for Vec<T> {
    fn encode(&self, enc: &mut Encoder<'_, '_>) -> Result<()> {
        enc.list(self)
    }
}
