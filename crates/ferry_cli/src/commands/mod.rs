pub(crate) mod common;
pub(crate) mod dump;
pub(crate) mod json;
pub(crate) mod nodes;
