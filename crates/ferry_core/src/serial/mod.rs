//! The flat structured-value stream.
//!
//! A [`Serialization`] encodes one nested value as a sequence of [`Node`]s:
//! `Open`/`Close` bracket containers, `Name` introduces a labeled child and
//! `Item` carries a scalar. Every producer call either appends exactly one
//! node or fails without touching the stream, so a stream that was built
//! without errors is always balanced, never mixes labeled and positional
//! siblings and never has a dangling name.
//!
//! Values pushed with [`Serialization::push_item`] are borrowed for `'a`.
//! The `_copied` variants copy text into an arena owned by the stream and
//! clone handles, which is how a `Serialization<'static>` is built from
//! short-lived arguments.

mod cursor;

use std::fmt;

use smallvec::SmallVec;

use crate::error::{Error, Result, StructureError};
use crate::handle::ForeignHandle;
use crate::value::Value;

pub use cursor::{Cursor, Mark};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node<'s> {
    Open,
    Close,
    Name(Value<'s>),
    Item(Value<'s>),
}

impl<'s> Node<'s> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Open => "open",
            Node::Close => "close",
            Node::Name(_) => "name",
            Node::Item(_) => "item",
        }
    }

    pub fn value(&self) -> Option<Value<'s>> {
        match *self {
            Node::Name(v) | Node::Item(v) => Some(v),
            Node::Open | Node::Close => None,
        }
    }
}

#[derive(Clone, Copy)]
enum Atom<'a> {
    Borrowed(Value<'a>),
    Bytes { start: usize, len: usize },
    Wide { start: usize, len: usize },
    Handle(usize),
}

#[derive(Clone, Copy)]
enum Entry<'a> {
    Open,
    Close,
    Name(Atom<'a>),
    Item(Atom<'a>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Labeling {
    Unknown,
    Labeled,
    Positional,
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    labeling: Labeling,
    awaiting_value: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Root {
    Empty,
    InProgress,
    Complete,
}

#[derive(Clone)]
pub struct Serialization<'a> {
    entries: Vec<Entry<'a>>,
    bytes: Vec<u8>,
    wide: Vec<u16>,
    handles: Vec<ForeignHandle>,
    frames: SmallVec<[Frame; 16]>,
    root: Root,
}

impl Default for Serialization<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Serialization<'a> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            bytes: Vec::new(),
            wide: Vec::new(),
            handles: Vec::new(),
            frames: SmallVec::new(),
            root: Root::Empty,
        }
    }

    pub fn with_capacity(nodes: usize) -> Self {
        let mut s = Self::new();
        s.entries.reserve(nodes);
        s
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Containers opened and not yet closed.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// True once exactly one top-level value has been fully written.
    pub fn is_complete(&self) -> bool {
        self.root == Root::Complete
    }

    /// Checks that the stream holds one complete value.
    pub fn finish(&self) -> Result<()> {
        match self.root {
            Root::Complete => Ok(()),
            Root::Empty => Err(StructureError::Empty.into()),
            Root::InProgress => Err(StructureError::Unterminated {
                open: self.frames.len(),
            }
            .into()),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.bytes.clear();
        self.wide.clear();
        self.handles.clear();
        self.frames.clear();
        self.root = Root::Empty;
    }

    pub fn open(&mut self) -> Result<()> {
        self.check_value()?;
        self.entries.try_reserve(1)?;
        self.begin_value();
        self.frames.push(Frame {
            labeling: Labeling::Unknown,
            awaiting_value: false,
        });
        self.root = Root::InProgress;
        self.entries.push(Entry::Open);
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        match self.frames.last() {
            None => return Err(StructureError::CloseWithoutOpen.into()),
            Some(f) if f.awaiting_value => return Err(StructureError::CloseAfterName.into()),
            Some(_) => {}
        }
        self.entries.try_reserve(1)?;
        self.frames.pop();
        self.entries.push(Entry::Close);
        if self.frames.is_empty() {
            self.root = Root::Complete;
        }
        Ok(())
    }

    /// Introduces a labeled child. Names must be numbers, text or void.
    pub fn push_name(&mut self, name: Value<'a>) -> Result<()> {
        self.check_name(&name)?;
        self.commit_name(Atom::Borrowed(name))
    }

    /// Like [`push_name`](Self::push_name), copying text into the stream.
    pub fn push_name_copied(&mut self, name: Value<'_>) -> Result<()> {
        self.check_name(&name)?;
        let atom = self.copy_value(name)?;
        self.commit_name(atom)
    }

    /// Appends a scalar. A serialization value is spliced in as one child.
    pub fn push_item(&mut self, item: Value<'a>) -> Result<()> {
        if let Value::SerializationRef(other) = item {
            return self.append(other);
        }
        self.check_value()?;
        self.commit_item(Atom::Borrowed(item))
    }

    /// Like [`push_item`](Self::push_item), copying text into the stream and
    /// cloning handles.
    pub fn push_item_copied(&mut self, item: Value<'_>) -> Result<()> {
        if let Value::SerializationRef(other) = item {
            return self.append_copied(other);
        }
        self.check_value()?;
        let atom = self.copy_value(item)?;
        self.commit_item(atom)
    }

    /// Splices a complete stream in as a single child value.
    pub fn append(&mut self, other: &Serialization<'a>) -> Result<()> {
        other.finish()?;
        self.check_value()?;
        self.entries.try_reserve(other.entries.len())?;
        let mark = self.entries.len();
        for entry in &other.entries {
            let copied = match entry {
                Entry::Open => Ok(Entry::Open),
                Entry::Close => Ok(Entry::Close),
                Entry::Name(a) => self.import(other, a).map(Entry::Name),
                Entry::Item(a) => self.import(other, a).map(Entry::Item),
            };
            match copied {
                Ok(e) => self.entries.push(e),
                Err(e) => {
                    self.entries.truncate(mark);
                    return Err(e);
                }
            }
        }
        self.commit_spliced();
        Ok(())
    }

    /// Splices a complete stream in as a single child value, copying all of
    /// its text so the result does not borrow from `other`.
    pub fn append_copied(&mut self, other: &Serialization<'_>) -> Result<()> {
        other.finish()?;
        self.check_value()?;
        self.entries.try_reserve(other.entries.len())?;
        let mark = self.entries.len();
        for node in other.nodes() {
            let copied = match node {
                Node::Open => Ok(Entry::Open),
                Node::Close => Ok(Entry::Close),
                Node::Name(v) => self.copy_value(v).map(Entry::Name),
                Node::Item(v) => self.copy_value(v).map(Entry::Item),
            };
            match copied {
                Ok(e) => self.entries.push(e),
                Err(e) => {
                    self.entries.truncate(mark);
                    return Err(e);
                }
            }
        }
        self.commit_spliced();
        Ok(())
    }

    fn check_value(&self) -> Result<()> {
        match self.frames.last() {
            None if self.root != Root::Empty => Err(StructureError::MultipleRoots.into()),
            None => Ok(()),
            Some(f) if f.awaiting_value => Ok(()),
            Some(f) if f.labeling == Labeling::Labeled => {
                Err(StructureError::MixedChildren { labeled_first: true }.into())
            }
            Some(_) => Ok(()),
        }
    }

    /// Records that a child value starts in the current container.
    fn begin_value(&mut self) {
        if let Some(f) = self.frames.last_mut() {
            if f.awaiting_value {
                f.awaiting_value = false;
            } else {
                f.labeling = Labeling::Positional;
            }
        }
    }

    fn commit_item(&mut self, atom: Atom<'a>) -> Result<()> {
        self.entries.try_reserve(1)?;
        self.begin_value();
        self.entries.push(Entry::Item(atom));
        if self.frames.is_empty() {
            self.root = Root::Complete;
        }
        Ok(())
    }

    fn commit_spliced(&mut self) {
        self.begin_value();
        if self.frames.is_empty() {
            self.root = Root::Complete;
        }
    }

    fn check_name(&self, name: &Value<'_>) -> Result<()> {
        if !(name.is_atomic() || name.is_void()) {
            return Err(StructureError::InvalidName(name.type_name()).into());
        }
        match self.frames.last() {
            None => Err(StructureError::NameOutsideContainer.into()),
            Some(f) if f.awaiting_value => Err(StructureError::NameAfterName.into()),
            Some(f) if f.labeling == Labeling::Positional => {
                Err(StructureError::MixedChildren { labeled_first: false }.into())
            }
            Some(_) => Ok(()),
        }
    }

    fn commit_name(&mut self, atom: Atom<'a>) -> Result<()> {
        self.entries.try_reserve(1)?;
        if let Some(f) = self.frames.last_mut() {
            f.labeling = Labeling::Labeled;
            f.awaiting_value = true;
        }
        self.entries.push(Entry::Name(atom));
        Ok(())
    }

    fn copy_value(&mut self, v: Value<'_>) -> Result<Atom<'a>> {
        Ok(match v {
            Value::Void => Atom::Borrowed(Value::Void),
            Value::Double(d) => Atom::Borrowed(Value::Double(d)),
            Value::UInt(u) => Atom::Borrowed(Value::UInt(u)),
            Value::Int(i) => Atom::Borrowed(Value::Int(i)),
            Value::String(b) => {
                self.bytes.try_reserve(b.len())?;
                let start = self.bytes.len();
                self.bytes.extend_from_slice(b);
                Atom::Bytes { start, len: b.len() }
            }
            Value::WideString(w) => {
                self.wide.try_reserve(w.len())?;
                let start = self.wide.len();
                self.wide.extend_from_slice(w);
                Atom::Wide { start, len: w.len() }
            }
            Value::ForeignHandle(h) => {
                self.handles.try_reserve(1)?;
                self.handles.push(h.clone());
                Atom::Handle(self.handles.len() - 1)
            }
            Value::SerializationRef(_) => {
                return Err(Error::type_mismatch("scalar", "structure"));
            }
        })
    }

    fn import(&mut self, src: &Serialization<'a>, atom: &Atom<'a>) -> Result<Atom<'a>> {
        match *atom {
            Atom::Borrowed(v) => Ok(Atom::Borrowed(v)),
            _ => self.copy_value(src.resolve(atom)),
        }
    }

    fn resolve(&self, atom: &Atom<'a>) -> Value<'_> {
        match *atom {
            Atom::Borrowed(v) => v,
            Atom::Bytes { start, len } => Value::String(&self.bytes[start..start + len]),
            Atom::Wide { start, len } => Value::WideString(&self.wide[start..start + len]),
            Atom::Handle(i) => Value::ForeignHandle(&self.handles[i]),
        }
    }

    fn node(&self, entry: &Entry<'a>) -> Node<'_> {
        match entry {
            Entry::Open => Node::Open,
            Entry::Close => Node::Close,
            Entry::Name(a) => Node::Name(self.resolve(a)),
            Entry::Item(a) => Node::Item(self.resolve(a)),
        }
    }

    pub fn node_at(&self, index: usize) -> Option<Node<'_>> {
        self.entries.get(index).map(|e| self.node(e))
    }

    pub fn nodes(&self) -> impl ExactSizeIterator<Item = Node<'_>> + Clone {
        self.entries.iter().map(move |e| self.node(e))
    }

    pub fn cursor(&self) -> Cursor<'_, 'a> {
        Cursor::new(self)
    }

    /// The root scalar, for streams whose whole value is a single item.
    pub fn root_item(&self) -> Option<Value<'_>> {
        match (self.entries.len(), self.entries.first()) {
            (1, Some(Entry::Item(a))) => Some(self.resolve(a)),
            _ => None,
        }
    }

    /// Rewrites a positional root container as a labeled one whose names are
    /// consecutive `UInt`s starting at `first_index`.
    pub fn to_labeled(&self, first_index: u64) -> Result<Serialization<'a>> {
        self.finish()?;
        let mut c = self.cursor();
        match c.next() {
            Some(Node::Open) => {}
            Some(_) => return Err(Error::type_mismatch("positional container", "item")),
            None => return Err(StructureError::Empty.into()),
        }
        if c.is_container_labeled() {
            return Err(Error::type_mismatch("positional container", "labeled container"));
        }

        let mut out = Serialization::with_capacity(self.entries.len() * 2);
        out.open()?;
        let exhausted = || Error::Overflow(format!("more children than names after {first_index}"));
        let mut next = Some(first_index);
        let mut depth = 1usize;
        for entry in &self.entries[1..] {
            match entry {
                Entry::Open => {
                    if depth == 1 {
                        let i = next.ok_or_else(exhausted)?;
                        out.push_name(Value::UInt(i))?;
                        next = i.checked_add(1);
                    }
                    depth += 1;
                    out.open()?;
                }
                Entry::Close => {
                    depth -= 1;
                    out.close()?;
                }
                Entry::Name(a) => {
                    let atom = out.import(self, a)?;
                    out.check_name(&Value::Void)?;
                    out.commit_name(atom)?;
                }
                Entry::Item(a) => {
                    if depth == 1 {
                        let i = next.ok_or_else(exhausted)?;
                        out.push_name(Value::UInt(i))?;
                        next = i.checked_add(1);
                    }
                    let atom = out.import(self, a)?;
                    out.check_value()?;
                    out.commit_item(atom)?;
                }
            }
        }
        Ok(out)
    }
}

impl PartialEq for Serialization<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.nodes().eq(other.nodes())
    }
}

impl Eq for Serialization<'_> {}

impl fmt::Debug for Serialization<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes()).finish()
    }
}

/// Indented dump, one node per line.
impl fmt::Display for Serialization<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0usize;
        for node in self.nodes() {
            if node == Node::Close {
                depth = depth.saturating_sub(1);
            }
            write!(f, "{:width$}", "", width = depth * 2)?;
            match node {
                Node::Open => {
                    f.write_str("open")?;
                    depth += 1;
                }
                Node::Close => f.write_str("close")?,
                Node::Name(v) => {
                    f.write_str("name ")?;
                    write_atom(f, &v)?;
                }
                Node::Item(v) => {
                    f.write_str("item ")?;
                    write_atom(f, &v)?;
                }
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

fn write_atom(f: &mut fmt::Formatter<'_>, v: &Value<'_>) -> fmt::Result {
    match v {
        Value::Void => f.write_str("void"),
        Value::String(_) | Value::WideString(_) => write!(f, "{:?}", v.to_string()),
        Value::Double(_) => write!(f, "{v}d"),
        _ => write!(f, "{v}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Serialization<'static> {
        let mut s = Serialization::new();
        s.open().unwrap();
        s.push_name("name".into()).unwrap();
        s.push_item("doc1".into()).unwrap();
        s.push_name("terms".into()).unwrap();
        s.open().unwrap();
        for i in 1..=3i64 {
            s.push_item(i.into()).unwrap();
        }
        s.close().unwrap();
        s.close().unwrap();
        s
    }

    #[test]
    fn builds_expected_node_sequence() {
        let s = doc();
        assert!(s.is_complete());
        let nodes: Vec<_> = s.nodes().collect();
        assert_eq!(
            nodes,
            vec![
                Node::Open,
                Node::Name(Value::str("name")),
                Node::Item(Value::str("doc1")),
                Node::Name(Value::str("terms")),
                Node::Open,
                Node::Item(Value::Int(1)),
                Node::Item(Value::Int(2)),
                Node::Item(Value::Int(3)),
                Node::Close,
                Node::Close,
            ]
        );
    }

    #[test]
    fn close_without_open_fails_at_the_call() {
        let mut s = Serialization::new();
        assert_eq!(
            s.close().unwrap_err(),
            Error::Structure(StructureError::CloseWithoutOpen)
        );
        assert!(s.is_empty());
    }

    #[test]
    fn name_rules() {
        let mut s = Serialization::new();
        assert_eq!(
            s.push_name("x".into()).unwrap_err(),
            Error::from(StructureError::NameOutsideContainer)
        );
        s.open().unwrap();
        s.push_name("x".into()).unwrap();
        assert_eq!(
            s.push_name("y".into()).unwrap_err(),
            Error::from(StructureError::NameAfterName)
        );
        assert_eq!(s.close().unwrap_err(), Error::from(StructureError::CloseAfterName));
        s.push_item(1i64.into()).unwrap();
        s.close().unwrap();
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn mixed_children_are_rejected_both_ways() {
        let mut s = Serialization::new();
        s.open().unwrap();
        s.push_name("a".into()).unwrap();
        s.push_item(1i64.into()).unwrap();
        assert_eq!(
            s.push_item(2i64.into()).unwrap_err(),
            Error::from(StructureError::MixedChildren { labeled_first: true })
        );
        assert_eq!(
            s.open().unwrap_err(),
            Error::from(StructureError::MixedChildren { labeled_first: true })
        );

        let mut s = Serialization::new();
        s.open().unwrap();
        s.push_item(1i64.into()).unwrap();
        assert_eq!(
            s.push_name("a".into()).unwrap_err(),
            Error::from(StructureError::MixedChildren { labeled_first: false })
        );
    }

    #[test]
    fn container_children_count_as_values() {
        let mut s = Serialization::new();
        s.open().unwrap();
        s.push_name("terms".into()).unwrap();
        s.open().unwrap();
        s.push_item(1i64.into()).unwrap();
        s.close().unwrap();
        s.push_name("next".into()).unwrap();
        s.open().unwrap();
        s.close().unwrap();
        s.close().unwrap();
        assert!(s.is_complete());

        let mut s = Serialization::new();
        s.open().unwrap();
        s.push_name("a".into()).unwrap();
        s.open().unwrap();
        s.close().unwrap();
        assert_eq!(
            s.push_item(2i64.into()).unwrap_err(),
            Error::from(StructureError::MixedChildren { labeled_first: true })
        );
    }

    #[test]
    fn container_child_makes_parent_positional() {
        let mut s = Serialization::new();
        s.open().unwrap();
        s.open().unwrap();
        s.close().unwrap();
        assert_eq!(
            s.push_name("x".into()).unwrap_err(),
            Error::from(StructureError::MixedChildren { labeled_first: false })
        );
        s.open().unwrap();
        s.close().unwrap();
        s.close().unwrap();
        assert_eq!(s.len(), 6);
    }

    #[test]
    fn only_one_root() {
        let mut s = Serialization::new();
        s.push_item(Value::Int(1)).unwrap();
        assert!(s.is_complete());
        assert_eq!(
            s.push_item(Value::Int(2)).unwrap_err(),
            Error::from(StructureError::MultipleRoots)
        );
        assert_eq!(s.open().unwrap_err(), Error::from(StructureError::MultipleRoots));
        assert_eq!(s.root_item(), Some(Value::Int(1)));
    }

    #[test]
    fn handles_cannot_be_names() {
        let h = ForeignHandle::null(crate::handle::ClassId(1));
        let mut s = Serialization::new();
        s.open().unwrap();
        assert_eq!(
            s.push_name(Value::handle(&h)).unwrap_err(),
            Error::from(StructureError::InvalidName("object"))
        );
        s.push_name(Value::Int(0)).unwrap();
        s.push_item(Value::handle(&h)).unwrap();
        s.close().unwrap();
    }

    #[test]
    fn finish_reports_what_is_missing() {
        let mut s = Serialization::new();
        assert_eq!(s.finish().unwrap_err(), Error::from(StructureError::Empty));
        s.open().unwrap();
        s.open().unwrap();
        assert_eq!(
            s.finish().unwrap_err(),
            Error::from(StructureError::Unterminated { open: 2 })
        );
    }

    #[test]
    fn copied_text_outlives_its_source() {
        let mut s: Serialization<'static> = Serialization::new();
        {
            let name = String::from("key");
            let wide: Vec<u16> = "wert".encode_utf16().collect();
            s.open().unwrap();
            s.push_name_copied(Value::from(&name)).unwrap();
            s.push_item_copied(Value::wide(&wide)).unwrap();
            s.close().unwrap();
        }
        let nodes: Vec<_> = s.nodes().collect();
        assert_eq!(nodes[1], Node::Name(Value::str("key")));
        assert_eq!(nodes[2].value().and_then(|v| v.length()), Some(4));
    }

    #[test]
    fn append_splices_one_child() {
        let inner = doc();
        let mut outer = Serialization::new();
        outer.open().unwrap();
        outer.push_item(Value::Int(0)).unwrap();
        outer.push_item(Value::serialization(&inner)).unwrap();
        outer.close().unwrap();
        assert_eq!(outer.len(), inner.len() + 3);
        assert!(outer.is_complete());

        let mut unfinished = Serialization::new();
        unfinished.open().unwrap();
        let mut target = Serialization::new();
        target.open().unwrap();
        assert!(target.append(&unfinished).is_err());
    }

    #[test]
    fn to_labeled_numbers_top_level_children() {
        let mut s = Serialization::new();
        s.open().unwrap();
        s.push_item("a".into()).unwrap();
        s.open().unwrap();
        s.push_item("b".into()).unwrap();
        s.close().unwrap();
        s.push_item("c".into()).unwrap();
        s.close().unwrap();

        let l = s.to_labeled(0).unwrap();
        let names: Vec<_> = l
            .nodes()
            .filter_map(|n| match n {
                Node::Name(v) => Some(v),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec![Value::UInt(0), Value::UInt(1), Value::UInt(2)]);
        assert!(l.is_complete());
        assert!(doc().to_labeled(0).is_err());
    }

    #[test]
    fn to_labeled_runs_out_of_names() {
        let mut s = Serialization::new();
        s.open().unwrap();
        s.push_item(Value::Int(1)).unwrap();
        s.close().unwrap();
        let l = s.to_labeled(u64::MAX).unwrap();
        assert_eq!(l.node_at(1), Some(Node::Name(Value::UInt(u64::MAX))));

        let mut s = Serialization::new();
        s.open().unwrap();
        s.push_item(Value::Int(1)).unwrap();
        s.open().unwrap();
        s.close().unwrap();
        s.close().unwrap();
        assert!(matches!(s.to_labeled(u64::MAX), Err(Error::Overflow(_))));
    }

    #[test]
    fn display_dumps_indented_nodes() {
        let mut s = Serialization::new();
        s.open().unwrap();
        s.push_name("k".into()).unwrap();
        s.push_item(Value::Double(1.5)).unwrap();
        s.close().unwrap();
        assert_eq!(s.to_string(), "open\n  name \"k\"\n  item 1.5d\nclose\n");
    }
}
