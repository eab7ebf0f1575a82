//! Unified error type for request-shim.
//!
//! Every failure a call can produce is an [`Error`]:
//! - missing or malformed request targets, detected before dispatch
//! - HTTP responses outside the `[200, 400)` success range
//! - transport failures (connection refused, DNS, TLS, ...)
//! - timeout cancellation
//!
//! Callback-style calls receive the error as the `Err` side of their outcome,
//! awaitable calls reject with it. Transport failures and status failures
//! share one shape so call sites can branch on [`Error::status_code`] alone.
//!
//! Malformed JSON under `json: true` is deliberately not an error: the body
//! degrades to text instead.

use core::time::Duration;
use std::error::Error as StdError;
use std::sync::Arc;

use http::StatusCode;
use thiserror::Error;

use crate::response::{Response, ResponseBody};

/// Unified error type for all request-shim operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// No `url`/`uri` was supplied by the call or the instance defaults.
    #[error("options.uri is a required argument")]
    MissingUrl,

    /// The target could not be parsed as an absolute URL.
    #[error("invalid URI {url:?}: {reason}")]
    InvalidUrl {
        /// The offending input.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Request construction error (invalid header name or value, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The server answered with a status outside `[200, 400)`.
    ///
    /// The body has been fully read and parsed; it is available through
    /// [`Error::body`].
    #[error("{message}")]
    Http {
        /// HTTP status code.
        status: StatusCode,
        /// `HTTP Error: <code> <reason>`.
        message: String,
        /// The complete response, body included.
        response: Box<Response>,
    },

    /// Network transport layer error (connection failed, DNS resolution failed, etc.).
    #[error("network error: {0}")]
    Network(#[source] Arc<dyn StdError + Send + Sync>),

    /// The call was aborted because its timeout elapsed.
    #[error("request aborted: timed out after {}ms", .after.as_millis())]
    Cancelled {
        /// The configured timeout.
        after: Duration,
    },

    /// Too many redirects were followed.
    #[error("too many redirects (max {max})")]
    TooManyRedirects {
        /// Maximum number of redirects allowed.
        max: u32,
    },

    /// A stream consumer attached after the body was buffered.
    #[error("response body already consumed")]
    BodyConsumed,

    /// Writing to a pipe destination failed.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

impl Error {
    /// Wrap a transport failure.
    pub fn network(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Network(Arc::new(err))
    }

    /// Build a transport failure from a plain message.
    pub fn network_msg(message: impl Into<String>) -> Self {
        Self::Network(Arc::new(Message(message.into())))
    }

    pub(crate) fn http(response: Response) -> Self {
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default();
        let message = format!("HTTP Error: {} {reason}", status.as_u16())
            .trim_end()
            .to_owned();
        Self::Http {
            status,
            message,
            response: Box::new(response),
        }
    }

    /// Legacy `error.statusCode`: present only for status failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }

    /// The response that caused a status failure.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Http { response, .. } => Some(response.as_ref()),
            _ => None,
        }
    }

    /// Body read from a failed response.
    pub fn body(&self) -> Option<&ResponseBody> {
        self.response().map(Response::body)
    }

    /// Check if this is a network transport error.
    pub const fn is_network_error(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Check if this call was cancelled by its timeout.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Check if this is a client error (4xx HTTP status).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Http { status, .. } if status.is_client_error())
    }

    /// Check if this is a server error (5xx HTTP status).
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Http { status, .. } if status.is_server_error())
    }

    /// Check if this error was raised before anything was sent.
    pub const fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::MissingUrl | Self::InvalidUrl { .. } | Self::InvalidRequest(_)
        )
    }

    /// Get the error category/kind.
    ///
    /// Useful for logging.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingUrl | Self::InvalidUrl { .. } | Self::InvalidRequest(_) => {
                ErrorKind::Request
            }
            Self::Http { .. } => ErrorKind::HttpStatus,
            Self::Network(_) => ErrorKind::Network,
            Self::Cancelled { .. } => ErrorKind::Cancellation,
            Self::TooManyRedirects { .. } => ErrorKind::Redirect,
            Self::BodyConsumed => ErrorKind::Body,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Error category labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request construction error, raised before dispatch
    Request,
    /// Non-success HTTP status
    HttpStatus,
    /// Transport/network error
    Network,
    /// Timeout cancellation
    Cancellation,
    /// Redirect error
    Redirect,
    /// Body consumption error
    Body,
    /// I/O error
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::HttpStatus => write!(f, "http_status"),
            Self::Network => write!(f, "network"),
            Self::Cancellation => write!(f, "cancellation"),
            Self::Redirect => write!(f, "redirect"),
            Self::Body => write!(f, "body"),
            Self::Io => write!(f, "io"),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;
