//! Byte-channel abstraction handed to acceptors.
//!
//! After an upgrade the HTTP layer gives up an opaque duplex byte stream.
//! `ByteChannel` erases its concrete type (hyper's upgraded I/O, a TCP
//! stream, an in-memory duplex in tests) and tags it with a connection ID
//! for tracing.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Relaxed ordering is enough: IDs only need to be unique.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transferred connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Any raw duplex byte stream the bridge can hand off.
pub trait RawConnection: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> RawConnection for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// An owned, type-erased connection. Dropping it closes the connection.
pub struct ByteChannel {
    id: ConnectionId,
    protocol: String,
    io: Box<dyn RawConnection>,
}

impl ByteChannel {
    pub fn new<R: RawConnection>(protocol: impl Into<String>, raw: R) -> Self {
        Self {
            id: ConnectionId::new(),
            protocol: protocol.into(),
            io: Box::new(raw),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Upgrade protocol this channel was negotiated under.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Close the connection without handing it to anyone.
    pub fn close(self) {
        tracing::trace!(connection_id = %self.id, "Channel closed");
    }
}

impl fmt::Debug for ByteChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteChannel")
            .field("id", &self.id)
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

impl AsyncRead for ByteChannel {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().io).poll_read(cx, buf)
    }
}

impl AsyncWrite for ByteChannel {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut *self.get_mut().io).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().io).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[tokio::test]
    async fn channel_passes_bytes_through() {
        let (client, server) = tokio::io::duplex(64);
        let mut channel = ByteChannel::new("proto", server);
        let mut client = client;

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        channel.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        channel.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn closing_channel_ends_peer_stream() {
        let (mut client, server) = tokio::io::duplex(64);
        ByteChannel::new("proto", server).close();

        let mut buf = Vec::new();
        let n = client.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }
}
