
use core::time::Duration;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures_util::stream;
use http::{HeaderMap, Method, Request, StatusCode, Uri};

use crate::backend::{ClientBackend, TransportBody};
use crate::error::Error;
use crate::Client;

/// Scripted reply of a [`MockBackend`].
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
    chunks: Vec<Bytes>,
    delay: Option<Duration>,
    error: Option<String>,
    broken_after_chunks: Option<String>,
}

impl Reply {
    pub fn status(code: u16) -> Self {
        Self {
            status: StatusCode::from_u16(code).unwrap(),
            headers: Vec::new(),
            chunks: Vec::new(),
            delay: None,
            error: None,
            broken_after_chunks: None,
        }
    }

    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn json(body: &serde_json::Value) -> Self {
        Self::ok()
            .header("content-type", "application/json")
            .body(body.to_string())
    }

    pub fn redirect(code: u16, location: &str) -> Self {
        Self::status(code).header("location", location)
    }

    pub fn network_error(message: &str) -> Self {
        let mut reply = Self::ok();
        reply.error = Some(message.to_owned());
        reply
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.chunks = vec![body.into()];
        self
    }

    pub fn chunks<I: IntoIterator<Item = &'static str>>(mut self, chunks: I) -> Self {
        self.chunks = chunks
            .into_iter()
            .map(|chunk| Bytes::from_static(chunk.as_bytes()))
            .collect();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn broken_after_chunks(mut self, message: &str) -> Self {
        self.broken_after_chunks = Some(message.to_owned());
        self
    }

    async fn into_response(self) -> Result<http::Response<TransportBody>, Error> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.error {
            return Err(Error::network_msg(message));
        }

        let mut items: Vec<Result<Bytes, Error>> = self.chunks.into_iter().map(Ok).collect();
        if let Some(message) = self.broken_after_chunks {
            items.push(Err(Error::network_msg(message)));
        }
        let body: TransportBody = Box::pin(stream::iter(items));

        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        Ok(builder.body(body).unwrap())
    }
}

/// A request as the backend saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Seen {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

type Handler = Box<dyn Fn(&Seen) -> Reply + Send + Sync>;

struct Inner {
    handler: Handler,
    seen: Mutex<Vec<Seen>>,
}

/// In-memory backend answering each request through a handler.
#[derive(Clone)]
pub struct MockBackend {
    inner: Arc<Inner>,
}

impl MockBackend {
    pub fn new(handler: impl Fn(&Seen) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                handler: Box::new(handler),
                seen: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Always answer with `reply`.
    pub fn fixed(reply: Reply) -> Self {
        Self::new(move |_| reply.clone())
    }

    pub fn client(&self) -> Client<Self> {
        Client::with_backend(self.clone())
    }

    pub fn requests(&self) -> Vec<Seen> {
        self.inner.seen.lock().unwrap().clone()
    }

    pub fn last(&self) -> Seen {
        self.requests().pop().expect("no request was sent")
    }
}

impl ClientBackend for MockBackend {
    fn send(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<http::Response<TransportBody>, Error>> + Send {
        let (parts, body) = request.into_parts();
        let seen = Seen {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        };
        let reply = (self.inner.handler)(&seen);
        self.inner.seen.lock().unwrap().push(seen);
        reply.into_response()
    }
}
