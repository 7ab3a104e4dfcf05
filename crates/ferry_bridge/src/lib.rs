//! The native side of the ferry call boundary.
//!
//! - `registry` - process-wide class-id registry
//! - `outcome` - `CallOutcome` and its fixed-size error buffer
//! - `call` - argument binding and the panic-proof call wrappers

pub mod call;
pub mod outcome;
pub mod registry;

pub use call::{Args, IntoOutcome, Owned, call_constructor, call_function, call_method};
pub use outcome::{CallOutcome, ErrorBuffer, MAX_ERROR_MESSAGE_SIZE};
pub use registry::{ClassInfo, ClassRegistry, RegistryBuilder, RegistryError};
