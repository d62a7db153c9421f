//! provides the core [`Request`] type and [`prepare`], which turns a base
//! request plus a set of keyword bindings into a concrete, sendable request
mod request;
mod template;

use std::collections::BTreeMap;

pub use self::request::Request;
pub use self::template::prepare;

/// keyword to payload bindings for a single request instantiation
///
/// a [`BTreeMap`] keeps substitution order deterministic (lexicographic by keyword)
/// when one keyword's value contains another keyword
pub type InputMap = BTreeMap<String, Vec<u8>>;
