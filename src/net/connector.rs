//! Pool connector backed by a swappable connection factory.
//!
//! The hyper-util pool calls the connector whenever it needs a new
//! connection. The connector ignores the destination URI and invokes the
//! current factory exactly once, bounded by the handshake timeout.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::Uri;
use futures_util::future::{BoxFuture, FutureExt};
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;

use crate::net::connection::{BoxConnection, ConnectionFactory};
use crate::observability::metrics;

/// Shared slot holding the factory currently used for new dials.
pub type FactorySlot = Arc<ArcSwap<Box<dyn ConnectionFactory>>>;

/// Create a slot holding `factory`.
pub fn factory_slot(factory: impl ConnectionFactory) -> FactorySlot {
    Arc::new(ArcSwap::from_pointee(Box::new(factory) as Box<dyn ConnectionFactory>))
}

/// hyper-util connector dialing through the factory slot.
#[derive(Clone)]
pub struct FactoryConnector {
    factory: FactorySlot,
    handshake_timeout: Duration,
}

impl FactoryConnector {
    pub fn new(factory: FactorySlot, handshake_timeout: Duration) -> Self {
        Self {
            factory,
            handshake_timeout,
        }
    }
}

impl tower::Service<Uri> for FactoryConnector {
    type Response = PooledStream;
    type Error = io::Error;
    type Future = BoxFuture<'static, io::Result<PooledStream>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _dst: Uri) -> Self::Future {
        // Load once: a factory swapped mid-dial only affects later dials.
        let factory = self.factory.load_full();
        let handshake_timeout = self.handshake_timeout;

        async move {
            let result = match tokio::time::timeout(handshake_timeout, factory.connect()).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connection factory exceeded {:?}", handshake_timeout),
                )),
            };
            metrics::record_dial(result.is_ok());
            match result {
                Ok(conn) => {
                    tracing::trace!("Dialed new pooled waf connection");
                    Ok(PooledStream::new(conn))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Connection factory failed");
                    Err(e)
                }
            }
        }
        .boxed()
    }
}

/// A factory-produced connection adapted to hyper's IO traits.
pub struct PooledStream {
    inner: TokioIo<BoxConnection>,
}

impl PooledStream {
    fn new(conn: BoxConnection) -> Self {
        Self {
            inner: TokioIo::new(conn),
        }
    }
}

impl Connection for PooledStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl hyper::rt::Read for PooledStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        hyper::rt::Read::poll_read(Pin::new(&mut self.inner), cx, buf)
    }
}

impl hyper::rt::Write for PooledStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        hyper::rt::Write::poll_write(Pin::new(&mut self.inner), cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_flush(Pin::new(&mut self.inner), cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        hyper::rt::Write::poll_shutdown(Pin::new(&mut self.inner), cx)
    }
}
