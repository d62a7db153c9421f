//! home to fuffa's cross-cutting traits, utilities, etc... Follows
//! the same structure as [`std`] where possible.

pub mod convert;
pub mod fmt;
pub mod ops;
pub mod str;
