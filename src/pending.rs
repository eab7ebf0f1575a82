//! The value returned by a call made without a callback.
//!
//! A [`Pending`] is both:
//! - **awaitable**: `pending.await` settles with [`Settled`];
//! - **streamable**: [`Pending::stream`] / [`Pending::pipe`] drain the body.
//!
//! Which one consumes the body is decided once, when the response head
//! arrives:
//!
//! ```text
//! Pending ──stream() before head──▶ Streaming ──▶ Settled::Streamed(head)
//!    │
//!    └──head arrives, no consumer──▶ Buffering ──▶ Settled::Buffered(response)
//! ```
//!
//! Failures reject the awaitable and are also delivered as the stream's
//! item, so neither consumer hangs. The request is dispatched once, when the
//! `Pending` is created.

use core::pin::Pin;
use core::task::{Context, Poll};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use bytes::{Bytes, BytesMut};
use futures_channel::{mpsc, oneshot};
use futures_util::io::{AsyncWrite, AsyncWriteExt};
use futures_util::{SinkExt, Stream, StreamExt};
use tracing::{debug, trace};

use crate::backend::{ClientBackend, TransportBody};
use crate::cookie::CookieJar;
use crate::error::{Error, Result};
use crate::fetch::{Fetched, fetch};
use crate::options::RequestOptions;
use crate::response::{self, Response, ResponseBody, ResponseHead};
use crate::timeout::{Deadline, within};

const BODY_CHANNEL_CAPACITY: usize = 16;

const PENDING: u8 = 0;
const STREAMING: u8 = 1;
const BUFFERING: u8 = 2;

/// Consumption mode, claimed at most once.
#[derive(Debug, Default)]
struct ModeCell(AtomicU8);

impl ModeCell {
    /// Move out of `PENDING` into `mode`; false if another mode won.
    fn claim(&self, mode: u8) -> bool {
        self.0
            .compare_exchange(PENDING, mode, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// What an awaited [`Pending`] resolves to.
#[derive(Debug, Clone)]
pub enum Settled {
    /// No stream consumer was attached: the body was read and parsed.
    Buffered(Response),
    /// The body went to the stream consumer; only the head is kept here.
    Streamed(ResponseHead),
}

impl Settled {
    /// Status line, headers and URL.
    pub const fn head(&self) -> &ResponseHead {
        match self {
            Self::Buffered(response) => response.head(),
            Self::Streamed(head) => head,
        }
    }

    /// Parsed body, when buffered.
    pub const fn body(&self) -> Option<&ResponseBody> {
        match self {
            Self::Buffered(response) => Some(response.body()),
            Self::Streamed(_) => None,
        }
    }

    /// The full response, when buffered.
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Buffered(response) => Some(response),
            Self::Streamed(_) => None,
        }
    }
}

/// Single-shot settlement; later attempts are swallowed.
struct Settle {
    tx: Option<oneshot::Sender<Result<Settled>>>,
}

impl Settle {
    const fn new(tx: oneshot::Sender<Result<Settled>>) -> Self {
        Self { tx: Some(tx) }
    }

    fn settle(&mut self, outcome: Result<Settled>) {
        match self.tx.take() {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    trace!("awaitable dropped before settlement");
                }
            }
            None => trace!("ignoring duplicate settlement"),
        }
    }
}

/// An in-flight request, consumable as a stream or as a future.
#[derive(Debug)]
#[must_use = "the response is lost unless the request is awaited or streamed"]
pub struct Pending {
    mode: Arc<ModeCell>,
    settled: oneshot::Receiver<Result<Settled>>,
    body: Option<mpsc::Receiver<Result<Bytes>>>,
}

impl Pending {
    /// Dispatch `options` on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub(crate) fn spawn<B: ClientBackend>(
        backend: Arc<B>,
        options: RequestOptions,
        jar: Option<CookieJar>,
    ) -> Self {
        let mode = Arc::new(ModeCell::default());
        let (settle_tx, settle_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);

        let driver = Driver {
            mode: Arc::clone(&mode),
            settle: Settle::new(settle_tx),
            body: body_tx,
        };
        tokio::spawn(driver.run(backend, options, jar));

        Self {
            mode,
            settled: settle_rx,
            body: Some(body_rx),
        }
    }

    /// Attach a stream consumer.
    ///
    /// Attached before the response head arrives, the stream receives the
    /// body and awaiting yields [`Settled::Streamed`]. Attached later, the
    /// stream yields a single [`Error::BodyConsumed`] (or the request's
    /// error). Only the first call gets the body.
    pub fn stream(&mut self) -> BodyStream {
        let Some(rx) = self.body.take() else {
            return BodyStream::consumed();
        };
        if self.mode.claim(STREAMING) {
            debug!("stream consumer attached");
        }
        BodyStream { rx }
    }

    /// Stream the body into `dest`, then return the response head.
    ///
    /// # Errors
    ///
    /// Fails with the request's error, or [`Error::Io`] when `dest` fails.
    pub async fn pipe<W: AsyncWrite + Unpin>(mut self, dest: W) -> Result<ResponseHead> {
        let written = self.stream().pipe_to(dest).await?;
        trace!(written, "pipe finished");
        Ok(self.await?.head().clone())
    }
}

impl IntoFuture for Pending {
    type Output = Result<Settled>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<Settled>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let Self { settled, body, .. } = self;
            let outcome = settled.await;
            drop(body);
            outcome.unwrap_or_else(|_| Err(Error::network_msg("request task ended before settling")))
        })
    }
}

/// Response body delivered chunk by chunk.
#[derive(Debug)]
pub struct BodyStream {
    rx: mpsc::Receiver<Result<Bytes>>,
}

impl BodyStream {
    fn consumed() -> Self {
        let (mut tx, rx) = mpsc::channel(1);
        // A fresh channel always has room for one item.
        let _ = tx.try_send(Err(Error::BodyConsumed));
        Self { rx }
    }

    /// Copy every chunk into `dest` and flush it. Returns the bytes written.
    ///
    /// # Errors
    ///
    /// Fails with the first error item, or [`Error::Io`] when `dest` fails.
    pub async fn pipe_to<W: AsyncWrite + Unpin>(mut self, mut dest: W) -> Result<u64> {
        let mut written = 0u64;
        while let Some(chunk) = self.next().await {
            let chunk = chunk?;
            dest.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        dest.flush().await?;
        Ok(written)
    }

    /// Gather the remaining chunks.
    ///
    /// # Errors
    ///
    /// Fails with the first error item.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for BodyStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_next_unpin(cx)
    }
}

/// Task half of a [`Pending`].
struct Driver {
    mode: Arc<ModeCell>,
    settle: Settle,
    body: mpsc::Sender<Result<Bytes>>,
}

impl Driver {
    async fn run<B: ClientBackend>(
        mut self,
        backend: Arc<B>,
        options: RequestOptions,
        jar: Option<CookieJar>,
    ) {
        let deadline = Deadline::arm(options.timeout);
        let fetched = within(deadline, fetch(backend.as_ref(), &options, jar.as_ref())).await;
        let Fetched { head, body } = match fetched {
            Ok(fetched) => fetched,
            Err(err) => return self.fail(err),
        };

        // Whoever claims first decides; a failed claim means a consumer
        // attached before the head arrived.
        let streaming = !self.mode.claim(BUFFERING);

        if streaming && head.is_success() {
            debug!(status = head.status_code(), "streaming response body");
            self.settle.settle(Ok(Settled::Streamed(head)));
            if let Err(err) = within(deadline, self.forward(body)).await {
                self.emit(Err(err));
            }
            return;
        }

        debug!(status = head.status_code(), streaming, "buffering response body");
        let outcome = match within(deadline, response::collect(body)).await {
            Ok(bytes) => response::adapt(head, bytes, &options),
            Err(err) => Err(err),
        };
        match outcome {
            Ok(response) => {
                self.emit(Err(Error::BodyConsumed));
                self.settle.settle(Ok(Settled::Buffered(response)));
            }
            Err(err) => self.fail(err),
        }
    }

    async fn forward(&mut self, mut body: TransportBody) -> Result<()> {
        while let Some(chunk) = body.next().await {
            let failed = chunk.is_err();
            if self.body.send(chunk).await.is_err() {
                trace!("stream consumer went away");
                return Ok(());
            }
            if failed {
                break;
            }
        }
        Ok(())
    }

    fn emit(&mut self, item: Result<Bytes>) {
        if self.body.try_send(item).is_err() {
            trace!("no stream consumer to notify");
        }
    }

    fn fail(&mut self, err: Error) {
        debug!(kind = %err.kind(), error = %err, "request failed");
        self.emit(Err(err.clone()));
        self.settle.settle(Err(err));
    }
}
