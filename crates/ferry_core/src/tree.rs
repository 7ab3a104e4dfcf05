//! An owned nested value, decoded from a stream or encoded into one.

use crate::error::{Error, Result, StructureError};
use crate::handle::ForeignHandle;
use crate::host::{Encoder, HostValue};
use crate::serial::{Node, Serialization};
use crate::value::Value;

pub const DEFAULT_DECODE_DEPTH: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeConfig {
    pub max_depth: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_DECODE_DEPTH,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Tree {
    #[default]
    Void,
    Double(f64),
    UInt(u64),
    Int(i64),
    String(Vec<u8>),
    WideString(Vec<u16>),
    Handle(ForeignHandle),
    Labeled(Vec<(Tree, Tree)>),
    Positional(Vec<Tree>),
}

struct Frame {
    labeled: Option<bool>,
    pairs: Vec<(Tree, Tree)>,
    items: Vec<Tree>,
    name: Option<Tree>,
}

impl Frame {
    fn new() -> Self {
        Self {
            labeled: None,
            pairs: Vec::new(),
            items: Vec::new(),
            name: None,
        }
    }

    fn place(&mut self, t: Tree) -> Result<()> {
        match self.name.take() {
            Some(name) => self.pairs.push((name, t)),
            None if self.labeled == Some(true) => {
                return Err(StructureError::MixedChildren { labeled_first: true }.into());
            }
            None => {
                self.labeled = Some(false);
                self.items.push(t);
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Tree> {
        if self.name.is_some() {
            return Err(StructureError::CloseAfterName.into());
        }
        Ok(match self.labeled {
            Some(true) => Tree::Labeled(self.pairs),
            _ => Tree::Positional(self.items),
        })
    }
}

impl Tree {
    pub fn str(s: &str) -> Self {
        Tree::String(s.as_bytes().to_vec())
    }

    /// Copies a scalar value.
    pub fn from_value(v: Value<'_>) -> Result<Self> {
        Ok(match v {
            Value::Void => Tree::Void,
            Value::Double(d) => Tree::Double(d),
            Value::UInt(u) => Tree::UInt(u),
            Value::Int(i) => Tree::Int(i),
            Value::String(b) => Tree::String(b.to_vec()),
            Value::WideString(w) => Tree::WideString(w.to_vec()),
            Value::ForeignHandle(h) => Tree::Handle(h.clone()),
            Value::SerializationRef(s) => Tree::decode(s, DecodeConfig::default())?,
        })
    }

    /// The scalar as a borrowed value; `None` for containers.
    pub fn as_value(&self) -> Option<Value<'_>> {
        Some(match self {
            Tree::Void => Value::Void,
            Tree::Double(d) => Value::Double(*d),
            Tree::UInt(u) => Value::UInt(*u),
            Tree::Int(i) => Value::Int(*i),
            Tree::String(b) => Value::String(b),
            Tree::WideString(w) => Value::WideString(w),
            Tree::Handle(h) => Value::ForeignHandle(h),
            Tree::Labeled(_) | Tree::Positional(_) => return None,
        })
    }

    pub fn is_labeled(&self) -> bool {
        matches!(self, Tree::Labeled(_))
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, Tree::Positional(_))
    }

    /// Number of children of a container.
    pub fn len(&self) -> Option<usize> {
        match self {
            Tree::Labeled(pairs) => Some(pairs.len()),
            Tree::Positional(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Child of a labeled container whose name equals `name`.
    pub fn get(&self, name: &str) -> Option<&Tree> {
        match self {
            Tree::Labeled(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_value() == Some(Value::str(name)))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Rebuilds the nested value a stream describes.
    ///
    /// Uses an explicit stack, so the call depth does not grow with the
    /// input. Each container's labeling is taken from its first child and
    /// every later sibling is checked against it.
    pub fn decode(ser: &Serialization<'_>, config: DecodeConfig) -> Result<Tree> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut root: Option<Tree> = None;

        for node in ser.cursor() {
            match node {
                Node::Open => {
                    if stack.len() >= config.max_depth {
                        tracing::debug!(target: "ferry::serial", limit = config.max_depth, "stream nested too deeply to decode");
                        return Err(StructureError::TooDeep {
                            limit: config.max_depth,
                        }
                        .into());
                    }
                    if stack.is_empty() && root.is_some() {
                        return Err(StructureError::MultipleRoots.into());
                    }
                    stack.try_reserve(1)?;
                    stack.push(Frame::new());
                }
                Node::Close => {
                    let frame = stack.pop().ok_or(StructureError::CloseWithoutOpen)?;
                    let t = frame.finish()?;
                    place(&mut stack, &mut root, t)?;
                }
                Node::Name(v) => {
                    let top = stack.last_mut().ok_or(StructureError::NameOutsideContainer)?;
                    if top.name.is_some() {
                        return Err(StructureError::NameAfterName.into());
                    }
                    if top.labeled == Some(false) {
                        return Err(StructureError::MixedChildren { labeled_first: false }.into());
                    }
                    top.labeled = Some(true);
                    top.name = Some(Tree::from_value(v)?);
                }
                Node::Item(v) => {
                    let t = Tree::from_value(v)?;
                    place(&mut stack, &mut root, t)?;
                }
            }
        }

        if !stack.is_empty() {
            return Err(StructureError::Unterminated { open: stack.len() }.into());
        }
        root.ok_or_else(|| StructureError::Empty.into())
    }
}

fn place(stack: &mut [Frame], root: &mut Option<Tree>, t: Tree) -> Result<()> {
    match stack.last_mut() {
        Some(top) => top.place(t),
        None if root.is_some() => Err(StructureError::MultipleRoots.into()),
        None => {
            *root = Some(t);
            Ok(())
        }
    }
}

impl HostValue for Tree {
    fn encode(&self, enc: &mut Encoder<'_, '_>) -> Result<()> {
        match self {
            Tree::Labeled(pairs) => {
                enc.open()?;
                for (k, v) in pairs {
                    let name = k
                        .as_value()
                        .ok_or(StructureError::InvalidName("structure"))?;
                    enc.name(name)?;
                    enc.value(v)?;
                }
                enc.close()
            }
            Tree::Positional(items) => enc.list(items),
            scalar => match scalar.as_value() {
                Some(v) => enc.item(v),
                None => Err(Error::type_mismatch("scalar", "structure")),
            },
        }
    }
}

impl From<i64> for Tree {
    fn from(v: i64) -> Self {
        Tree::Int(v)
    }
}

impl From<u64> for Tree {
    fn from(v: u64) -> Self {
        Tree::UInt(v)
    }
}

impl From<f64> for Tree {
    fn from(v: f64) -> Self {
        Tree::Double(v)
    }
}

impl From<&str> for Tree {
    fn from(v: &str) -> Self {
        Tree::str(v)
    }
}

impl From<Vec<Tree>> for Tree {
    fn from(v: Vec<Tree>) -> Self {
        Tree::Positional(v)
    }
}
