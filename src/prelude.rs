//! small collection of widely used core types and traits
//!
//! The goal in using the prelude is to reduce the number of imports
//! needed to (mostly) only those that have direct impact on the actual
//! implementation of a fuzzing run.
//!
//! # Traits
//!
//! - [`Runner`] - exposes the `prepare`, `execute`, and `dump` methods on [`AsyncClient`]
//! - [`InputProvider`] - exposes the cursor methods on implementing types such as [`Wordlist`]
//! - [`Len`] - exposes the `len` method on implementing types such as [`Wordlist`]
//! - [`AsInner`] - exposes the `inner` method on implementing types such as [`Wordlist`]
//! - [`AsBytes`] - exposes the `as_bytes` method on implementing types such as [`Payload`]
//!
//! # Structs & Enums
//!
//! - [`Config`] - run-wide settings
//! - [`Wordlist`] - the payload source
//! - [`Payload`] - a single value bound to its keyword
//! - [`Request`] and [`InputMap`] - the request template and its keyword bindings
//! - [`Response`] - the normalized response
//! - [`AsyncClient`] - the request executor

#[cfg(docsrs)]
use crate::{AsBytes, AsInner, Len};

// traits that are likely to be used by anyone driving a run
pub use crate::client::Runner;
pub use crate::corpora::InputProvider;
pub use crate::AsBytes as _;
pub use crate::AsInner as _;
pub use crate::Len as _;

// core structs needed by everyone
pub use crate::client::AsyncClient;
pub use crate::config::Config;
pub use crate::corpora::Wordlist;
pub use crate::input::Payload;
pub use crate::requests::{InputMap, Request};
pub use crate::responses::Response;

// crate's error type
pub use crate::error::FuffaError;
