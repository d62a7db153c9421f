//! Custom error-type definitions
#![allow(clippy::use_self)] // clippy false-positive on RequestErrorKind, doesn't want to apply directly to the enums that derive Serialize
use thiserror::Error;
use url::ParseError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// primary error-type for the fuffa library
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FuffaError {
    /// Represents a failure to stat or open a wordlist file
    #[error("The wordlist `{path}` couldn't be opened.")]
    WordlistOpenError {
        /// underlying source error-type
        source: std::io::Error,

        /// path to the file that couldn't be opened
        path: String,
    },

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError {
        /// underlying source error-type
        #[from]
        source: std::io::Error,
    },

    /// Represents a failure to parse the given string into a [`url::Url`](https://docs.rs/url/latest/url/struct.Url.html).
    #[error("The url `{url}` is invalid and couldn't be parsed.")]
    InvalidUrl {
        /// underlying source error-type
        source: ParseError,

        /// the url that couldn't be parsed
        url: String,
    },

    /// Represents a failure to generate an [`http::Method`] from a string
    #[error("Could not parse the given http method `{method}`")]
    MethodParseError {
        /// the method that couldn't be parsed
        method: String,
    },

    /// Represents a header name or value that can't be put on the wire
    #[error("Could not use header `{name}` in a request")]
    InvalidHeader {
        /// name of the offending header
        name: String,
    },

    /// Represents a url that parses, but can't be turned into a request target
    /// (unsupported scheme, missing host, or characters the wire format rejects)
    #[error("The url `{url}` can't be sent: {reason}")]
    InvalidRequestTarget {
        /// the url that couldn't be used
        url: String,

        /// why the url was rejected
        reason: String,
    },

    /// Represents a failure to construct the TLS connector of the underlying client
    #[error("Could not build the http client")]
    ClientBuildError {
        /// underlying source error-type
        source: native_tls::Error,
    },

    /// Represents a failure encountered during sending a request / receiving a response
    #[error("An error occurred while sending the request: {kind:?} {message}")]
    RequestError {
        /// what category of error occurred
        kind: RequestErrorKind,

        /// the underlying error message
        message: String,
    },

    /// Represents an exchange that was abandoned because the run's
    /// cancellation token fired
    #[error("The request was cancelled before it completed")]
    Cancelled,
}

/// Used to differentiate between different types of errors that occur when making requests.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[non_exhaustive]
pub enum RequestErrorKind {
    /// Represents a failure to read a response body
    Body(Option<u16>),

    /// Represents a failure during client connection to target
    Connect(Option<u16>),

    /// Represents a failure to decode a response body
    Decode(Option<u16>),

    /// Represents a failure to related to redirection, i.e. too many redirects
    Redirect(Option<u16>),

    /// Represents a failure related to the request
    Request(Option<u16>),

    /// Represents a timeout during the request
    Timeout,

    /// Represents an unexpected error
    #[default]
    Unknown,
}
