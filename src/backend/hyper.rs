use ::hyper::body::Incoming;
use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::{BodyDataStream, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::trace;

use super::{ClientBackend, TransportBody};
use crate::error::Error;

/// Backend built on hyper's pooled client, with rustls for `https`.
#[derive(Debug, Clone)]
pub struct HyperBackend {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl Default for HyperBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperBackend {
    /// Create a backend trusting the bundled webpki roots.
    #[must_use]
    pub fn new() -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);
        let client = HyperClient::builder(TokioExecutor::new()).build(https);

        Self { client }
    }
}

impl ClientBackend for HyperBackend {
    async fn send(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<TransportBody>, Error> {
        trace!(method = %request.method(), uri = %request.uri(), "hyper send");
        let response: http::Response<Incoming> = self
            .client
            .request(request.map(Full::new))
            .await
            .map_err(Error::network)?;

        Ok(response.map(|body: Incoming| {
            let stream = BodyDataStream::new(body).map_err(Error::network);
            Box::pin(stream) as TransportBody
        }))
    }
}
