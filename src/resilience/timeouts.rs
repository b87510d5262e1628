//! Timeout enforcement.
//!
//! # Responsibilities
//! - Hold the connect and read timeouts of an upstream
//! - Bound every response body frame by the read timeout
//!
//! # Design Decisions
//! - Uses Tokio's timer facilities
//! - The read deadline restarts whenever the consumer asks for the next
//!   frame, so long but steady downloads and slow readers are never cut off
//! - Timed-out requests return 504 Gateway Timeout

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use hyper::body::{Body, Frame, SizeHint};
use tokio::time::{sleep, Instant, Sleep};

use crate::error::ProxyError;

/// Connect and read timeouts for a single upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamTimeouts {
    /// Time allowed to establish a new upstream connection.
    pub connect: Duration,
    /// Time allowed for the upstream to produce the next piece of the response.
    pub read: Duration,
}

impl Default for UpstreamTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(60),
        }
    }
}

/// Response body that fails when the upstream stalls for longer than the read timeout.
pub struct TimeoutBody<B> {
    inner: Pin<Box<B>>,
    timeout: Duration,
    deadline: Pin<Box<Sleep>>,
    /// A frame was handed out since the deadline was last armed.
    yielded: bool,
    upstream: Arc<str>,
}

impl<B> TimeoutBody<B> {
    pub fn new(inner: B, timeout: Duration, upstream: Arc<str>) -> Self {
        Self {
            inner: Box::pin(inner),
            timeout,
            deadline: Box::pin(sleep(timeout)),
            yielded: false,
            upstream,
        }
    }
}

impl<B> Body for TimeoutBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: fmt::Display,
{
    type Data = Bytes;
    type Error = ProxyError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        // Time spent while the consumer was not polling does not count.
        if this.yielded {
            this.yielded = false;
            let next = Instant::now() + this.timeout;
            this.deadline.as_mut().reset(next);
        }

        match this.inner.as_mut().poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                this.yielded = true;
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(ProxyError::Body {
                upstream: this.upstream.to_string(),
                reason: e.to_string(),
            }))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => match this.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    tracing::warn!(
                        upstream = %this.upstream,
                        timeout = ?this.timeout,
                        "Upstream stalled while streaming response body"
                    );
                    Poll::Ready(Some(Err(ProxyError::ReadTimeout {
                        upstream: this.upstream.to_string(),
                        timeout: this.timeout,
                    })))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
