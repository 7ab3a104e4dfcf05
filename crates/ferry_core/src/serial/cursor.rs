//! Forward-only reader over a finished stream.

use crate::error::{Error, Result, StructureError};
use crate::value::Value;

use super::{Node, Serialization};

/// A saved cursor position for [`Cursor::rewind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mark {
    pos: usize,
    depth: usize,
}

/// Walks the nodes of a [`Serialization`] in order.
///
/// Several cursors may read the same stream at once. Skipping is always an
/// iterative depth count, so arbitrarily deep streams are safe to traverse.
#[derive(Clone)]
pub struct Cursor<'s, 'a> {
    ser: &'s Serialization<'a>,
    pos: usize,
    depth: usize,
}

impl<'s, 'a> Cursor<'s, 'a> {
    pub fn new(ser: &'s Serialization<'a>) -> Self {
        Self { ser, pos: 0, depth: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Containers entered and not yet left.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.ser.len()
    }

    pub fn peek(&self) -> Option<Node<'s>> {
        self.ser.node_at(self.pos)
    }

    pub fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            depth: self.depth,
        }
    }

    pub fn rewind(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.depth = mark.depth;
    }

    /// Back to the root.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.depth = 0;
    }

    /// Call right after consuming an `Open`: true when the first child is
    /// introduced by a name.
    pub fn is_container_labeled(&self) -> bool {
        matches!(self.peek(), Some(Node::Name(_)))
    }

    /// Call right after consuming an `Open`: true when the first child has no
    /// name. An empty container counts as positional.
    pub fn is_container_positional(&self) -> bool {
        matches!(self.peek(), Some(Node::Item(_) | Node::Open | Node::Close))
    }

    pub fn expect_open(&mut self) -> Result<()> {
        match self.next() {
            Some(Node::Open) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub fn expect_close(&mut self) -> Result<()> {
        match self.next() {
            Some(Node::Close) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Consumes the next child: its name, if any, and its whole value.
    pub fn skip_value(&mut self) -> Result<()> {
        if let Some(Node::Name(_)) = self.peek() {
            self.next();
        }
        let start = self.depth;
        match self.next() {
            Some(Node::Item(_)) => return Ok(()),
            Some(Node::Open) => {}
            other => return Err(unexpected(other)),
        }
        while self.depth > start {
            if self.next().is_none() {
                return Err(StructureError::Unterminated {
                    open: self.depth - start,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Consumes the rest of the current container including its `Close`.
    pub fn skip_to_close(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(StructureError::CloseWithoutOpen.into());
        }
        let target = self.depth - 1;
        while self.depth > target {
            if self.next().is_none() {
                return Err(StructureError::Unterminated {
                    open: self.depth - target,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Positions the cursor on the value of the `index`-th child of the
    /// container just entered. Returns `false`, leaving the cursor where it
    /// was, when there are fewer children.
    pub fn child(&mut self, index: usize) -> Result<bool> {
        let mark = self.mark();
        for _ in 0..index {
            if let Some(Node::Close) | None = self.peek() {
                self.rewind(mark);
                return Ok(false);
            }
            self.skip_value()?;
        }
        match self.peek() {
            Some(Node::Name(_)) => {
                self.next();
                Ok(true)
            }
            Some(Node::Item(_) | Node::Open) => Ok(true),
            _ => {
                self.rewind(mark);
                Ok(false)
            }
        }
    }

    /// Positions the cursor on the value named `name` in the labeled
    /// container just entered. Returns `false`, leaving the cursor where it
    /// was, when no child has that name.
    pub fn find(&mut self, name: &Value<'_>) -> Result<bool> {
        let mark = self.mark();
        loop {
            match self.peek() {
                Some(Node::Name(n)) if n == *name => {
                    self.next();
                    return Ok(true);
                }
                Some(Node::Name(_)) => self.skip_value()?,
                Some(Node::Close) | None => {
                    self.rewind(mark);
                    return Ok(false);
                }
                Some(Node::Item(_) | Node::Open) => {
                    self.rewind(mark);
                    return Err(Error::type_mismatch("labeled container", "positional container"));
                }
            }
        }
    }
}

fn unexpected(node: Option<Node<'_>>) -> Error {
    StructureError::UnexpectedNode(node.map_or("end of stream", |n| n.kind_name())).into()
}

impl<'s> Iterator for Cursor<'s, '_> {
    type Item = Node<'s>;

    fn next(&mut self) -> Option<Node<'s>> {
        let node = self.peek()?;
        self.pos += 1;
        match node {
            Node::Open => self.depth += 1,
            Node::Close => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        Some(node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.ser.len().saturating_sub(self.pos);
        (rest, Some(rest))
    }
}
