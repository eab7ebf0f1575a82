//! HTTP client backends.
//!
//! This module defines the `ClientBackend` trait, the transport primitive every
//! call goes through, and provides the default implementation.

use core::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

use crate::error::Error;

mod hyper;
pub use hyper::HyperBackend;

/// Streaming response body handed back by a backend.
pub type TransportBody = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Trait for HTTP client backends.
///
/// A backend performs exactly one network exchange per `send`. It must hand
/// back every response it receives, whatever its status: classifying
/// success is the caller's job.
pub trait ClientBackend: Send + Sync + 'static {
    /// Send `request` and resolve once the response head is available.
    fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> impl Future<Output = Result<http::Response<TransportBody>, Error>> + Send;
}

/// The default HTTP client backend.
pub type DefaultBackend = HyperBackend;
