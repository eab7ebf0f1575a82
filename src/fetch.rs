//! The transport call: translate, send, follow redirects, feed the jar.

use http::HeaderValue;
use http::header::COOKIE;
use tracing::debug;
use url::Url;

use crate::backend::{ClientBackend, TransportBody};
use crate::cookie::CookieJar;
use crate::error::{Error, Result};
use crate::options::RequestOptions;
use crate::redirect::{self, Replay};
use crate::response::{self, Response, ResponseHead};
use crate::timeout::{Deadline, within};
use crate::translate::translate;

/// Head of the final response plus its unread body.
pub(crate) struct Fetched {
    pub(crate) head: ResponseHead,
    pub(crate) body: TransportBody,
}

/// Perform the transport call for `options`, following redirects.
///
/// Every hop's `set-cookie` headers reach `jar` before the next hop's
/// `Cookie` header is computed.
pub(crate) async fn fetch<B: ClientBackend>(
    backend: &B,
    options: &RequestOptions,
    jar: Option<&CookieJar>,
) -> Result<Fetched> {
    let mut request = translate(options, jar).await?;
    let mut url = Url::parse(&request.uri().to_string()).map_err(|err| Error::InvalidUrl {
        url: request.uri().to_string(),
        reason: err.to_string(),
    })?;
    let mut redirects = 0;

    loop {
        debug!(method = %request.method(), %url, "dispatching request");
        let replay = options.follow_redirect.then(|| Replay::capture(&request));
        let (parts, body) = backend.send(request).await?.into_parts();
        debug!(status = parts.status.as_u16(), %url, "response head received");

        if let Some(jar) = jar {
            response::record_cookies(jar, &url, &parts.headers).await;
        }

        let next = replay.and_then(|replay| {
            redirect::target(parts.status, &parts.headers, &url).map(|to| (replay, to))
        });
        let Some((replay, to)) = next else {
            return Ok(Fetched {
                head: ResponseHead::new(parts.status, parts.headers, url),
                body,
            });
        };

        if redirects >= options.max_redirects {
            return Err(Error::TooManyRedirects {
                max: options.max_redirects,
            });
        }
        redirects += 1;

        let mut next_request = replay.follow(parts.status, &url, &to)?;
        if let Some(jar) = jar {
            // A caller-supplied cookie survives hops the jar has nothing for.
            let cookies = jar.cookie_string(&to).await;
            if !cookies.is_empty() {
                let value = HeaderValue::from_str(&cookies)
                    .map_err(|err| Error::InvalidRequest(err.to_string()))?;
                next_request.headers_mut().insert(COOKIE, value);
            }
        }

        debug!(from = %url, to = %to, status = parts.status.as_u16(), "following redirect");
        url = to;
        request = next_request;
    }
}

/// Run a whole call in buffering mode.
pub(crate) async fn execute<B: ClientBackend>(
    backend: &B,
    options: &RequestOptions,
    jar: Option<&CookieJar>,
) -> Result<Response> {
    let deadline = Deadline::arm(options.timeout);
    let Fetched { head, body } = within(deadline, fetch(backend, options, jar)).await?;
    let bytes = within(deadline, response::collect(body)).await?;
    response::adapt(head, bytes, options)
}
