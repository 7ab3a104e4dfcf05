//! Core types of the ferry value interchange protocol.
//!
//! This crate contains everything native code and host glue must agree on:
//! - `Value` - tagged scalar, borrowing its text, handle or structure
//! - `Serialization` - flat Open/Close/Name/Item stream for nested values
//! - `ForeignHandle` - reference-counted, class-tagged native object
//! - `HostValue` / `Encoder` - building streams from host structures
//! - `Tree` - owned nested value, the decode target
//! - `Error` - the shared error taxonomy

#![allow(clippy::len_without_is_empty)]

pub mod convert;
pub mod error;
pub mod handle;
pub mod host;
pub mod serial;
pub mod text;
pub mod tree;
pub mod value;

pub use error::{Error, ErrorKind, Result, StructureError};
pub use handle::{ClassId, Destructor, ForeignClass, ForeignHandle};
pub use host::{DEFAULT_MAX_DEPTH, EncodeConfig, Encoder, HostValue};
pub use serial::{Cursor, Mark, Node, Serialization};
pub use text::Encoding;
pub use tree::{DecodeConfig, Tree};
pub use value::{Value, ValueType};
