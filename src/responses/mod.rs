//! normalized http response produced by a [`Runner`]
//!
//! [`Runner`]: crate::client::Runner
use crate::requests::Request;
use crate::std_ext::str::canonical_header_key;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use http::header::{HeaderName, CONTENT_TYPE, LOCATION};
use http::response::Parts;

/// a server's response, with its body decoded and measured
///
/// the body (and its metrics) may be empty when the response was [`cancelled`]
///
/// [`cancelled`]: Response::cancelled
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub struct Response {
    pub(crate) status_code: u16,
    pub(crate) headers: BTreeMap<String, Vec<String>>,
    pub(crate) content_type: String,
    pub(crate) redirect_location: String,
    pub(crate) content_length: i64,
    pub(crate) content_words: usize,
    pub(crate) content_lines: usize,
    pub(crate) cancelled: bool,
    pub(crate) duration: Duration,
    pub(crate) timestamp: SystemTime,
    pub(crate) raw: String,
    pub(crate) request: Request,

    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) data: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status_code: Default::default(),
            headers: BTreeMap::default(),
            content_type: String::default(),
            redirect_location: String::default(),
            content_length: Default::default(),
            content_words: Default::default(),
            content_lines: Default::default(),
            cancelled: false,
            duration: Duration::default(),
            timestamp: SystemTime::UNIX_EPOCH,
            raw: String::default(),
            request: Request::default(),
            data: Vec::default(),
        }
    }
}

impl Response {
    /// Create a `Response` from the head (status line and headers) of an http response
    ///
    /// the body is attached separately with [`Response::set_data`], once it has been read
    /// and decoded
    ///
    /// # Examples
    ///
    /// ```
    /// # use fuffa::requests::Request;
    /// # use fuffa::responses::Response;
    /// let (head, ()) = http::response::Builder::new()
    ///     .status(301)
    ///     .header("location", "/login")
    ///     .header("content-type", "text/html")
    ///     .body(())
    ///     .unwrap()
    ///     .into_parts();
    ///
    /// let response = Response::from_head(Request::new("GET", "http://localhost/"), &head);
    ///
    /// assert_eq!(response.status_code(), 301);
    /// assert_eq!(response.redirect_location(), "/login");
    /// assert_eq!(response.content_type(), "text/html");
    /// assert_eq!(response.header("Location"), Some(&[String::from("/login")][..]));
    /// ```
    #[must_use]
    pub fn from_head(request: Request, head: &Parts) -> Self {
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (name, value) in &head.headers {
            headers
                .entry(canonical_header_key(name.as_str()))
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let first_header = |name: HeaderName| {
            head.headers
                .get(name)
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .unwrap_or_default()
        };

        Self {
            status_code: head.status.as_u16(),
            content_type: first_header(CONTENT_TYPE),
            redirect_location: first_header(LOCATION),
            headers,
            request,
            ..Self::default()
        }
    }

    /// attach the decoded body, recomputing content length, word count, and line count
    ///
    /// words and lines are counted by splitting on single `' '` and `'\n'` bytes
    /// respectively, so an empty body has one word and one line
    ///
    /// # Examples
    ///
    /// ```
    /// # use fuffa::responses::Response;
    /// let mut response = Response::default();
    /// response.set_data(b"hello  world\nsecond line".to_vec());
    ///
    /// assert_eq!(response.content_length(), 24);
    /// assert_eq!(response.content_words(), 4);
    /// assert_eq!(response.content_lines(), 2);
    /// ```
    #[allow(clippy::cast_possible_wrap)]
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.content_length = data.len() as i64;
        self.content_words = data.split(|byte| *byte == b' ').count();
        self.content_lines = data.split(|byte| *byte == b'\n').count();
        self.data = data;
    }

    /// get the status code
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status_code
    }

    /// get a reference to the headers, keyed by canonical name
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// get all values of a single header by canonical name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers.get(name).map(Vec::as_slice)
    }

    /// get the `Content-Type` header's value, or an empty string
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// get the `Location` header's value, or an empty string
    #[must_use]
    pub fn redirect_location(&self) -> &str {
        &self.redirect_location
    }

    /// get the decoded body
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// get the decoded body, as unicode
    ///
    /// # Note
    ///
    /// Conversion performed on call, cache results
    /// if you're into that sort of thing
    #[must_use]
    pub fn text(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.data)
    }

    /// get the content length
    ///
    /// this is the decoded body's length, or the declared `Content-Length` when the
    /// body was never downloaded
    #[must_use]
    pub const fn content_length(&self) -> i64 {
        self.content_length
    }

    /// get the number of space-separated words in the body
    #[must_use]
    pub const fn content_words(&self) -> usize {
        self.content_words
    }

    /// get the number of newline-separated lines in the body
    #[must_use]
    pub const fn content_lines(&self) -> usize {
        self.content_lines
    }

    /// whether the body was deliberately not downloaded
    #[must_use]
    pub const fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// time between the request being handed off and the first byte of the response
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// approximate wall-clock time at which the first byte of the response arrived
    #[must_use]
    pub const fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// get the wire-format response; only populated when raw capture is enabled
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// get the request that produced this response
    #[must_use]
    pub const fn request(&self) -> &Request {
        &self.request
    }
}
