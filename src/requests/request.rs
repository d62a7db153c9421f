//! Request object that serves both as a template (keywords still present) and as
//! the concrete request handed to a [`Runner`]
//!
//! [`Runner`]: crate::client::Runner
use super::InputMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::time::SystemTime;

/// data container representing the parts of an http request that take part in fuzzing
///
/// header names are kept as given until [`prepare`] canonicalizes them (`content-type`
/// becomes `Content-Type`), which leaves keywords in header names intact on the template
///
/// [`prepare`]: crate::requests::prepare
///
/// # Examples
///
/// ```
/// # use fuffa::requests::Request;
/// let mut request = Request::new("POST", "http://localhost/FUZZ");
/// request.add_header("x-api-key", "FUZZ");
/// request.set_data(b"user=FUZZ".to_vec());
///
/// assert_eq!(request.method(), "POST");
/// assert_eq!(request.url(), "http://localhost/FUZZ");
/// assert_eq!(request.header("X-Api-Key"), Some("FUZZ"));
/// assert_eq!(request.data(), b"user=FUZZ");
/// assert!(request.input().is_empty());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub struct Request {
    pub(crate) method: String,
    pub(crate) url: String,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) data: Vec<u8>,
    pub(crate) input: InputMap,
    pub(crate) host: String,
    pub(crate) raw: String,
    pub(crate) position: usize,
    pub(crate) timestamp: Option<SystemTime>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: String::from("GET"),
            url: String::new(),
            headers: BTreeMap::new(),
            data: Vec::new(),
            input: InputMap::new(),
            host: String::new(),
            raw: String::new(),
            position: 0,
            timestamp: None,
        }
    }
}

impl Request {
    // ----------------
    // Constructors
    // ----------------

    /// Return a new `Request` with the given method and url; the url is not
    /// validated until the request is sent
    #[must_use]
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            ..Self::default()
        }
    }

    // ----------------
    // Setters
    // ----------------

    /// add a header; an existing header with the same name is replaced
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.trim().to_string(), value.to_string());
    }

    /// replace the request body
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// set the position of the payload that produced this request
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    // ----------------
    // Getters
    // ----------------

    /// get the http method
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// get the url, as a string
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// get all headers
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// get a single header's value; names are compared case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// whether a header with the given name is present; names are compared
    /// case-insensitively
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// get the request body
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// get the keyword bindings that produced this request
    #[must_use]
    pub const fn input(&self) -> &InputMap {
        &self.input
    }

    /// get the authority the request was sent to; populated by the client
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// get the wire-format request; populated by the client when raw capture is enabled
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// get the position of the payload that produced this request
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// get the instant the request was handed to the transport; populated by the client
    #[must_use]
    pub const fn timestamp(&self) -> Option<SystemTime> {
        self.timestamp
    }
}
