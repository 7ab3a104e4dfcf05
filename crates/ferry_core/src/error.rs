//! Error taxonomy shared by every layer of the interchange protocol.
//!
//! Native code propagates [`Error`] with `?`; the boundary converts it into the
//! bounded message buffer of a call outcome, never unwinding through host frames.

use std::collections::TryReserveError;
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Stable numeric classification handed to host glue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    Ok = 0,
    Structure = 1,
    NoMemory = 2,
    TypeMismatch = 3,
    Encoding = 4,
    BufferOverflow = 5,
    OutOfRange = 6,
    NofArgs = 7,
    MissingSelf = 8,
}

impl ErrorKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => ErrorKind::Ok,
            1 => ErrorKind::Structure,
            2 => ErrorKind::NoMemory,
            3 => ErrorKind::TypeMismatch,
            4 => ErrorKind::Encoding,
            5 => ErrorKind::BufferOverflow,
            6 => ErrorKind::OutOfRange,
            7 => ErrorKind::NofArgs,
            8 => ErrorKind::MissingSelf,
            _ => return None,
        })
    }

    pub fn describe(self) -> &'static str {
        match self {
            ErrorKind::Ok => "ok",
            ErrorKind::Structure => "structure error",
            ErrorKind::NoMemory => "out of memory",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::Encoding => "string character encoding error",
            ErrorKind::BufferOverflow => "internal buffer not big enough",
            ErrorKind::OutOfRange => "value out of range",
            ErrorKind::NofArgs => "number of arguments does not match",
            ErrorKind::MissingSelf => "self argument is missing",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Violations of the serialization stream grammar.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("close without matching open")]
    CloseWithoutOpen,
    #[error("name followed by another name")]
    NameAfterName,
    #[error("name followed by close")]
    CloseAfterName,
    #[error("name outside of a container")]
    NameOutsideContainer,
    #[error("{}", mixed_children(.labeled_first))]
    MixedChildren { labeled_first: bool },
    #[error("more than one top-level value")]
    MultipleRoots,
    #[error("{open} container(s) left open")]
    Unterminated { open: usize },
    #[error("empty serialization")]
    Empty,
    #[error("structure nested deeper than {limit} levels")]
    TooDeep { limit: usize },
    #[error("cyclic structure")]
    Cycle,
    #[error("unexpected {0}")]
    UnexpectedNode(&'static str),
    #[error("{0} cannot be used as a name")]
    InvalidName(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("structure error: {0}")]
    Structure(#[from] StructureError),
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("value out of range: {0}")]
    Range(String),
    #[error("numeric overflow: {0}")]
    Overflow(String),
    #[error("string character encoding error: {0}")]
    Encoding(String),
    #[error("out of memory")]
    NoMemory,
    #[error("number of arguments does not match: expected {}, got {actual}", arity(.min, .max))]
    NofArgs { min: usize, max: usize, actual: usize },
    #[error("self argument is missing")]
    MissingSelf,
}

fn mixed_children(labeled_first: &bool) -> &'static str {
    if *labeled_first {
        "positional child in a labeled container"
    } else {
        "labeled child in a positional container"
    }
}

fn arity(min: &usize, max: &usize) -> String {
    if min == max {
        min.to_string()
    } else if *max == usize::MAX {
        format!("at least {min}")
    } else {
        format!("{min} to {max}")
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Structure(_) => ErrorKind::Structure,
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::Range(_) | Error::Overflow(_) => ErrorKind::OutOfRange,
            Error::Encoding(_) => ErrorKind::Encoding,
            Error::NoMemory => ErrorKind::NoMemory,
            Error::NofArgs { .. } => ErrorKind::NofArgs,
            Error::MissingSelf => ErrorKind::MissingSelf,
        }
    }

    pub fn type_mismatch(expected: &'static str, actual: &'static str) -> Self {
        Error::TypeMismatch { expected, actual }
    }

    pub fn is_structure(&self) -> bool {
        matches!(self, Error::Structure(_))
    }
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::NoMemory
    }
}
