//! Redirect policy: which responses are followed and how the next hop's
//! request is derived from the previous one.

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST, LOCATION};
use http::{HeaderMap, Method, Request, StatusCode};
use url::Url;

use crate::error::{Error, Result};

/// Where a response redirects to, if it is a redirect worth following.
///
/// A 3xx without a usable `Location` is handed back to the caller as is.
pub(crate) fn target(status: StatusCode, headers: &HeaderMap, current: &Url) -> Option<Url> {
    if !status.is_redirection() || status == StatusCode::NOT_MODIFIED {
        return None;
    }
    let location = headers.get(LOCATION)?.to_str().ok()?;
    Url::parse(location).or_else(|_| current.join(location)).ok()
}

/// Parts of a sent request needed to re-issue it against a redirect target.
#[derive(Debug, Clone)]
pub(crate) struct Replay {
    method: Method,
    headers: HeaderMap,
    body: Bytes,
}

impl Replay {
    pub(crate) fn capture(request: &Request<Bytes>) -> Self {
        Self {
            method: request.method().clone(),
            headers: request.headers().clone(),
            body: request.body().clone(),
        }
    }

    /// Request for the hop from `from` to `to` after a `status` response.
    ///
    /// 303, and 301/302 for anything but GET/HEAD, continue as a body-less
    /// GET. Credentials do not cross hosts.
    pub(crate) fn follow(&self, status: StatusCode, from: &Url, to: &Url) -> Result<Request<Bytes>> {
        let method = match status {
            StatusCode::SEE_OTHER if self.method != Method::HEAD => Method::GET,
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND
                if self.method != Method::GET && self.method != Method::HEAD =>
            {
                Method::GET
            }
            _ => self.method.clone(),
        };

        let mut headers = self.headers.clone();
        headers.remove(HOST);
        let body = if method == self.method {
            self.body.clone()
        } else {
            headers.remove(CONTENT_LENGTH);
            headers.remove(CONTENT_TYPE);
            Bytes::new()
        };
        if from.host_str() != to.host_str() {
            headers.remove(AUTHORIZATION);
            headers.remove(COOKIE);
        }

        let mut request = Request::builder()
            .method(method)
            .uri(to.as_str())
            .body(body)
            .map_err(|err| Error::InvalidRequest(format!("redirect to {to}: {err}")))?;
        *request.headers_mut() = headers;
        Ok(request)
    }
}
