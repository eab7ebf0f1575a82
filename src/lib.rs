//! # Legacy request compatibility layer
//! `request-shim` keeps code written against the classic callback-style
//! request API working on top of a modern async HTTP transport.
//! It covers:
//! - The three call shapes: `(url)`, `(url, options)` and `(options)`
//! - Verb shortcuts and derived instances with merged defaults
//! - `json`, `form`, `qs`, `auth`, `encoding`, `timeout` and `jar` options
//! - Results that can be awaited, streamed or piped, or delivered to a callback
//!
//! # Quick start
//! ```rust,no_run
//! # async fn example() -> Result<(), request_shim::Error> {
//! use request_shim::{Options, get};
//!
//! let settled = get(("https://example.com/api", Options::new().json(true)))?.await?;
//! println!("{:?}", settled.body());
//! # Ok(())
//! # }
//! ```
//!
//! Callback style:
//! ```rust,no_run
//! # async fn example() {
//! request_shim::get_with_callback("https://example.com/", |outcome| match outcome {
//!     Ok(response) => println!("{}", response.status_code()),
//!     Err(err) => eprintln!("{err}"),
//! })
//! .await
//! .ok();
//! # }
//! ```

pub mod auth;
pub mod backend;
mod client;
pub mod cookie;
mod error;
mod fetch;
pub mod options;
mod pending;
mod redirect;
pub mod response;
#[cfg(test)]
mod tests;
mod timeout;
pub mod translate;

pub use auth::Auth;
pub use backend::{ClientBackend, DefaultBackend, HyperBackend};
pub use client::Client;
pub use cookie::CookieJar;
pub use error::{Error, ErrorKind, Result};
pub use options::{Call, Encoding, Headers, Jar, Options, RequestBody, RequestOptions};
pub use pending::{BodyStream, Pending, Settled};
pub use response::{Response, ResponseBody, ResponseHead};

use tokio::task::JoinHandle;

/// Dispatch a call on a fresh [`Client`].
///
/// # Errors
///
/// Returns [`Error::MissingUrl`] when the call names no URL.
pub fn request(call: impl Into<Call>) -> Result<Pending> {
    Client::new().request(call)
}

/// Dispatch a call on a fresh [`Client`] and hand the outcome to `callback`.
pub fn request_with_callback<F>(call: impl Into<Call>, callback: F) -> JoinHandle<()>
where
    F: FnOnce(Result<Response>) + Send + 'static,
{
    Client::new().request_with_callback(call, callback)
}

/// A fresh [`Client`] with `partial` as its defaults.
#[must_use]
pub fn defaults(partial: Options) -> Client {
    Client::new().defaults(partial)
}

/// A new, empty cookie jar.
#[must_use]
pub fn jar() -> CookieJar {
    CookieJar::new()
}

macro_rules! verbs {
    ($($name:ident, $with_callback:ident;)*) => {
        $(
            #[doc = concat!("[`Client::", stringify!($name), "`] on a fresh [`Client`].")]
            ///
            /// # Errors
            ///
            /// Returns [`Error::MissingUrl`] when the call names no URL.
            pub fn $name(call: impl Into<Call>) -> Result<Pending> {
                Client::new().$name(call)
            }

            #[doc = concat!("[`Client::", stringify!($with_callback), "`] on a fresh [`Client`].")]
            pub fn $with_callback<F>(call: impl Into<Call>, callback: F) -> JoinHandle<()>
            where
                F: FnOnce(Result<Response>) + Send + 'static,
            {
                Client::new().$with_callback(call, callback)
            }
        )*
    };
}

verbs! {
    get, get_with_callback;
    post, post_with_callback;
    put, put_with_callback;
    delete, delete_with_callback;
    patch, patch_with_callback;
    head, head_with_callback;
    options, options_with_callback;
}
