//! Execution of prepared requests over a pooled [`hyper`] client
mod async_client;
mod builder;
mod connector;
mod decode;
mod proxy;
mod raw;
mod timing;
mod utils;

pub use self::async_client::AsyncClient;
pub use self::utils::DEFAULT_USER_AGENT;

use crate::error::FuffaError;
use crate::requests::{self, InputMap, Request};
use crate::responses::Response;

use async_trait::async_trait;

/// responses declaring a `Content-Length` above this many bytes are not downloaded
pub const MAX_DOWNLOAD_SIZE: i64 = 5_242_880;

/// trait for types that turn a templated [`Request`] into a [`Response`]
///
/// see [`AsyncClient`] for an example
#[async_trait]
pub trait Runner {
    /// substitute `input` into a copy of `base`
    ///
    /// the default implementation defers to [`requests::prepare`]
    fn prepare(&self, base: &Request, input: &InputMap) -> Request {
        requests::prepare(base, input)
    }

    /// send `request` and build its [`Response`]
    ///
    /// the request is updated in place with whatever the runner resolved while
    /// sending it (default headers, host, raw dump, dispatch timestamp)
    ///
    /// # Errors
    ///
    /// Implementors of this function have the option to error when things go awry
    async fn execute(&self, request: &mut Request) -> Result<Response, FuffaError>;

    /// render `request` as it would be put on the wire, without sending it
    ///
    /// # Errors
    ///
    /// Implementors of this function have the option to error when things go awry
    async fn dump(&self, request: &mut Request) -> Result<Vec<u8>, FuffaError>;
}
