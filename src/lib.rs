#![macro_use]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::perf,
    rustdoc::broken_intra_doc_links,
    missing_docs,
    clippy::missing_const_for_fn
)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)] // transitive duplicates pulled in by hyper/native-tls
//! Payload generation and single-request execution for a wordlist-driven http fuzzer.
//!
//! The pieces fit together as follows:
//!
//! - [`corpora::Wordlist`] turns a wordlist into deduplicated, extension-expanded payloads
//! - [`requests::prepare`] substitutes keyword bindings into a base [`requests::Request`]
//! - [`client::AsyncClient`] sends the concrete request and builds a [`responses::Response`]
//! - [`debug`] renders a request/response pair to the console for inspection

pub mod client;
pub mod config;
pub mod corpora;
pub mod debug;
pub mod error;
pub mod input;
pub mod prelude;
pub mod requests;
pub mod responses;
mod std_ext;

// re-exported traits, to be available as top-level imports for users
pub use std_ext::convert::{AsBytes, AsInner};
pub use std_ext::ops::Len;

/// Wrapper around `Atomic*.store` to save me from writing `Ordering::SeqCst` a bajillion times
#[macro_export]
macro_rules! atomic_store {
    ($atomic:expr, $value:expr) => {
        $atomic.store($value, Ordering::SeqCst);
    };
    ($atomic:expr, $value:expr, $ordering:expr) => {
        $atomic.store($value, $ordering);
    };
}
