//! Backend connections and the factories that produce them.
//!
//! # Responsibilities
//! - Define what a usable backend connection is (`BackendConnection`)
//! - Define the caller-supplied dialing capability (`ConnectionFactory`)
//! - Provide a TCP factory that rotates through a fixed address list
//!
//! # Design Decisions
//! - Any `Fn() -> Future<Output = io::Result<C>>` closure is a factory
//! - Factories own address selection; the pool never sees addresses
//! - Factories must be safe to invoke concurrently

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// A ready, bidirectional byte stream to the detection backend.
pub trait BackendConnection: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Address of the remote end, used for the health-check `Host` header.
    fn peer_addr(&self) -> io::Result<SocketAddr>;
}

/// Type-erased backend connection.
pub type BoxConnection = Box<dyn BackendConnection>;

impl BackendConnection for TcpStream {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }
}

impl BackendConnection for BoxConnection {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        (**self).peer_addr()
    }
}

/// Produces one ready connection per invocation.
pub trait ConnectionFactory: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'static, io::Result<BoxConnection>>;
}

impl<F, Fut, C> ConnectionFactory for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = io::Result<C>> + Send + 'static,
    C: BackendConnection,
{
    fn connect(&self) -> BoxFuture<'static, io::Result<BoxConnection>> {
        let pending = (self)();
        async move { pending.await.map(|conn| Box::new(conn) as BoxConnection) }.boxed()
    }
}

/// TCP factory dialing a fixed set of addresses in round-robin order.
#[derive(Debug)]
pub struct TcpConnectionFactory {
    addrs: Vec<SocketAddr>,
    connect_timeout: Duration,
    counter: AtomicUsize,
}

impl TcpConnectionFactory {
    /// Factory for a single backend address.
    pub fn new(addr: SocketAddr, connect_timeout: Duration) -> Self {
        Self::round_robin(vec![addr], connect_timeout)
    }

    /// Factory rotating through `addrs` on every dial.
    pub fn round_robin(addrs: Vec<SocketAddr>, connect_timeout: Duration) -> Self {
        Self {
            addrs,
            connect_timeout,
            counter: AtomicUsize::new(0),
        }
    }

    /// Address the next dial will target.
    fn next_addr(&self) -> Option<SocketAddr> {
        if self.addrs.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.addrs.len();
        Some(self.addrs[index])
    }
}

impl ConnectionFactory for TcpConnectionFactory {
    fn connect(&self) -> BoxFuture<'static, io::Result<BoxConnection>> {
        let addr = self.next_addr();
        let connect_timeout = self.connect_timeout;
        async move {
            let addr = addr.ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "no backend addresses configured")
            })?;
            let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    tracing::debug!(addr = %addr, error = %e, "Failed to dial waf server");
                    return Err(e);
                }
                Err(_) => {
                    tracing::debug!(addr = %addr, "Dial to waf server timed out");
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect to {} timed out", addr),
                    ));
                }
            };
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as BoxConnection)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn round_robin_rotates_addresses() {
        let a: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let factory = TcpConnectionFactory::round_robin(vec![a, b], Duration::from_secs(1));

        assert_eq!(factory.next_addr(), Some(a));
        assert_eq!(factory.next_addr(), Some(b));
        assert_eq!(factory.next_addr(), Some(a));
    }

    #[tokio::test]
    async fn empty_factory_fails_dial() {
        let factory = TcpConnectionFactory::round_robin(Vec::new(), Duration::from_secs(1));
        let err = factory.connect().await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn tcp_factory_dials_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let factory = TcpConnectionFactory::new(addr, Duration::from_secs(1));

        let conn = factory.connect().await.unwrap();
        assert_eq!(conn.peer_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn closures_are_factories() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let factory = move || TcpStream::connect(addr);

        let conn = ConnectionFactory::connect(&factory).await.unwrap();
        assert_eq!(conn.peer_addr().unwrap(), addr);
    }
}
