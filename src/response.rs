//! Legacy-shaped responses and the adapter that produces them.
//!
//! Classification is by status code only: `[200, 400)` succeeds, everything
//! else becomes [`Error::Http`] carrying the fully read body.

use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use http::{HeaderMap, StatusCode, header};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::backend::TransportBody;
use crate::cookie::CookieJar;
use crate::error::{Error, Result};
use crate::options::{Encoding, RequestOptions};

/// Status line, headers and final URL of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
}

impl ResponseHead {
    pub(crate) const fn new(status: StatusCode, headers: HeaderMap, url: Url) -> Self {
        Self {
            status,
            headers,
            url,
        }
    }

    /// Status code.
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Legacy `statusCode`.
    pub const fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Legacy `statusMessage`.
    pub fn status_message(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or_default()
    }

    /// Headers; names are lower-case.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of `name` as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Final URL, after redirects.
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the status counts as success.
    pub const fn is_success(&self) -> bool {
        is_success(self.status)
    }
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Raw bytes (`encoding: null`).
    Bytes(Bytes),
    /// Text.
    Text(String),
    /// Parsed JSON (`json: true` and the body parsed).
    Json(serde_json::Value),
}

impl ResponseBody {
    /// Body as text, when it was decoded as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Body as JSON, when it parsed.
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Body as raw bytes, when decoding was disabled.
    pub const fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Deserialize the body into `T`.
    ///
    /// Works on parsed JSON as well as on text and bytes holding JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the body does not describe a `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        match self {
            Self::Json(value) => T::deserialize(value),
            Self::Text(text) => serde_json::from_str(text),
            Self::Bytes(bytes) => serde_json::from_slice(bytes),
        }
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Text(text) => text.is_empty(),
            Self::Json(_) => false,
        }
    }
}

/// Complete legacy response.
#[derive(Debug, Clone)]
pub struct Response {
    head: ResponseHead,
    body: ResponseBody,
}

impl Response {
    pub(crate) const fn new(head: ResponseHead, body: ResponseBody) -> Self {
        Self { head, body }
    }

    /// Status line, headers and URL.
    pub const fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Status code.
    pub const fn status(&self) -> StatusCode {
        self.head.status
    }

    /// Legacy `statusCode`.
    pub const fn status_code(&self) -> u16 {
        self.head.status_code()
    }

    /// Headers; names are lower-case.
    pub const fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// First value of `name` as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.header(name)
    }

    /// Final URL.
    pub const fn url(&self) -> &Url {
        &self.head.url
    }

    /// Decoded body.
    pub const fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Take the body.
    pub fn into_body(self) -> ResponseBody {
        self.body
    }
}

/// Success is `[200, 400)`.
pub const fn is_success(status: StatusCode) -> bool {
    let code = status.as_u16();
    code >= 200 && code < 400
}

/// Decode a body per the call's `encoding` and `json` options.
///
/// A body that fails to parse as JSON falls back to text.
pub fn parse_body(bytes: Bytes, encoding: Encoding, json: bool) -> ResponseBody {
    if encoding == Encoding::Binary {
        return ResponseBody::Bytes(bytes);
    }
    let text = String::from_utf8_lossy(&bytes).into_owned();
    if json {
        match serde_json::from_str(&text) {
            Ok(value) => return ResponseBody::Json(value),
            Err(err) => {
                if !text.is_empty() {
                    debug!(%err, "response is not JSON, returning text");
                }
            }
        }
    }
    ResponseBody::Text(text)
}

/// Read a transport body to the end.
pub(crate) async fn collect(body: TransportBody) -> Result<Bytes> {
    body.try_fold(BytesMut::new(), |mut buf, chunk| async move {
        buf.extend_from_slice(&chunk);
        Ok(buf)
    })
    .await
    .map(BytesMut::freeze)
}

/// Turn a head and its buffered body into the call's outcome.
pub fn adapt(head: ResponseHead, bytes: Bytes, options: &RequestOptions) -> Result<Response> {
    let body = parse_body(bytes, options.encoding, options.json);
    let response = Response::new(head, body);
    if response.head.is_success() {
        Ok(response)
    } else {
        Err(Error::http(response))
    }
}

/// Record the `set-cookie` headers of one response in `jar`.
pub(crate) async fn record_cookies(jar: &CookieJar, url: &Url, headers: &HeaderMap) {
    let values: Vec<String> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_owned)
        .collect();
    if values.is_empty() {
        return;
    }
    let stored = jar.store_response_cookies(url, values).await;
    debug!(%url, stored, "updated cookie jar");
}
