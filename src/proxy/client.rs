//! Pooled upstream client.
//!
//! # Responsibilities
//! - Build the per-upstream HTTP/1.1 client (idle limit, connect timeout)
//! - Report when a forwarded request body has been sent in full
//! - Classify client failures into gateway errors
//!
//! # Design Decisions
//! - Pooling, keep-alive and idle expiry come from hyper-util's legacy client
//! - The connector enforces the connect timeout; the forwarder enforces the
//!   read timeout, starting once the request body is out

use std::error::Error as StdError;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use bytes::Bytes;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use hyper_util::client::legacy::{connect::HttpConnector, Client, Error as ClientError};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::sync::oneshot;
use tokio::time::error::Elapsed;

use crate::error::ProxyError;

/// Idle pooled connections are closed after this long.
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

pub type UpstreamClient = Client<HttpConnector, Body>;

/// Client keeping at most `max_idle` idle connections per upstream host.
pub fn upstream_client(connect_timeout: Duration, max_idle: usize) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(IDLE_TIMEOUT)
        .pool_max_idle_per_host(max_idle)
        .build(connector)
}

/// Map a client failure onto the gateway error it represents.
pub fn classify(upstream: &str, error: ClientError, connect_timeout: Duration) -> ProxyError {
    if !error.is_connect() {
        return ProxyError::Upstream {
            upstream: upstream.to_string(),
            source: error,
        };
    }

    if caused_by_timeout(&error) {
        ProxyError::ConnectTimeout {
            upstream: upstream.to_string(),
            timeout: connect_timeout,
        }
    } else {
        ProxyError::Connect {
            upstream: upstream.to_string(),
            source: Box::new(error),
        }
    }
}

fn caused_by_timeout(error: &(dyn StdError + 'static)) -> bool {
    let mut cause = Some(error);
    while let Some(err) = cause {
        if err.is::<Elapsed>() {
            return true;
        }
        if let Some(io) = err.downcast_ref::<io::Error>() {
            if io.kind() == io::ErrorKind::TimedOut {
                return true;
            }
        }
        cause = err.source();
    }
    false
}

/// Request body that fires a signal once its last frame has been handed out.
///
/// The receiver also resolves when the body is dropped unfinished.
pub struct UploadBody {
    inner: Body,
    sent: Option<oneshot::Sender<()>>,
}

impl UploadBody {
    pub fn new(inner: Body) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let mut body = Self {
            inner,
            sent: Some(tx),
        };
        // Bodiless requests are never polled.
        if body.inner.is_end_stream() {
            body.finish();
        }
        (body, rx)
    }

    fn finish(&mut self) {
        if let Some(sent) = self.sent.take() {
            let _ = sent.send(());
        }
    }
}

impl HttpBody for UploadBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => this.finish(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.finish(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use futures_util::{stream, StreamExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = upstream_client(Duration::from_secs(1), 4);
        let request = Request::builder()
            .uri(format!("http://{}/", addr))
            .body(Body::empty())
            .unwrap();
        let error = client.request(request).await.err().unwrap();

        let error = classify("http://closed", error, Duration::from_secs(1));
        assert!(matches!(error, ProxyError::Connect { .. }), "got {:?}", error);
    }

    #[test]
    fn elapsed_and_timed_out_causes_are_timeouts() {
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "connect timed out");
        assert!(caused_by_timeout(&timed_out));

        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(!caused_by_timeout(&refused));
    }

    #[tokio::test]
    async fn empty_body_is_sent_immediately() {
        let (_body, sent) = UploadBody::new(Body::empty());
        assert_eq!(sent.await, Ok(()));
    }

    #[tokio::test]
    async fn signal_fires_after_last_chunk() {
        let chunks = stream::iter(vec![
            Ok::<_, io::Error>(Bytes::from_static(b"one")),
            Ok(Bytes::from_static(b"two")),
        ]);
        let (body, mut sent) = UploadBody::new(Body::from_stream(chunks));
        let mut data = Body::new(body).into_data_stream();

        assert_eq!(data.next().await.unwrap().unwrap(), "one");
        assert!(sent.try_recv().is_err());
        assert_eq!(data.next().await.unwrap().unwrap(), "two");
        assert!(data.next().await.is_none());

        assert_eq!(sent.try_recv(), Ok(()));
    }
}
