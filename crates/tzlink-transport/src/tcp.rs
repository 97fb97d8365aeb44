//! TCP message stream

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use tzlink_core::{Endpoint, TzError, TzResult};
use tzlink_wire::{FrameHeader, Message, FRAME_HEADER_SIZE};

/// Default timeout for connects and call round-trips.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A framed message stream over a TCP connection.
#[derive(Debug)]
pub struct MessageStream {
    stream: TcpStream,
    peer: String,
}

impl MessageStream {
    /// Connect to an endpoint within the timeout.
    pub async fn connect(endpoint: &Endpoint, timeout: Duration) -> TzResult<Self> {
        let authority = endpoint.authority();
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&authority))
            .await
            .map_err(|_| TzError::Timeout(format!("connecting to {}", authority)))?
            .map_err(|e| classify_connect_error(&authority, e))?;

        tracing::debug!(peer = %authority, "connected");
        Ok(MessageStream {
            stream,
            peer: authority,
        })
    }

    /// Wrap an accepted connection.
    pub fn from_stream(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".into());
        MessageStream { stream, peer }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send one message.
    pub async fn send(&mut self, message: &Message) -> TzResult<()> {
        let frame = message.encode()?;
        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| classify_stream_error(&self.peer, e))
    }

    /// Receive one message: header first, then the payload it announces.
    pub async fn recv(&mut self) -> TzResult<Message> {
        let mut header_buf = [0u8; FRAME_HEADER_SIZE];
        self.stream
            .read_exact(&mut header_buf)
            .await
            .map_err(|e| classify_stream_error(&self.peer, e))?;

        let header = FrameHeader::parse(&header_buf)?;

        let mut payload = vec![0u8; header.payload_len as usize];
        self.stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| classify_stream_error(&self.peer, e))?;

        Message::decode_payload(&header, &payload)
    }

    /// Receive one message, or `None` when the peer has closed the
    /// connection at a frame boundary. Serve loops use this to end a
    /// connection cleanly.
    pub async fn recv_or_eof(&mut self) -> TzResult<Option<Message>> {
        match self.recv().await {
            Ok(message) => Ok(Some(message)),
            Err(TzError::ConnectionLost) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// One request/response round trip within the timeout.
    pub async fn call(&mut self, message: &Message, timeout: Duration) -> TzResult<Message> {
        self.send(message).await?;
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| TzError::Timeout(format!("call to {}", self.peer)))?
    }
}

fn classify_connect_error(authority: &str, err: io::Error) -> TzError {
    if err.kind() == io::ErrorKind::ConnectionRefused {
        TzError::ConnectionRefused(authority.to_string())
    } else {
        TzError::Transport(format!("connect to {}: {}", authority, err))
    }
}

fn classify_stream_error(peer: &str, err: io::Error) -> TzError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => TzError::ConnectionLost,
        _ => TzError::Transport(format!("io with {}: {}", peer, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn local_pair() -> (MessageStream, MessageStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let endpoint = Endpoint::new("127.0.0.1", port);

        let (client, (server, _)) = tokio::join!(
            MessageStream::connect(&endpoint, DEFAULT_IO_TIMEOUT),
            async { listener.accept().await.unwrap() }
        );
        (client.unwrap(), MessageStream::from_stream(server))
    }

    #[tokio::test]
    async fn test_send_recv_roundtrip() {
        let (mut client, mut server) = local_pair().await;

        let request = Message::LookupRequest {
            name: "TimeZoneConverter".into(),
        };
        client.send(&request).await.unwrap();
        assert_eq!(server.recv().await.unwrap(), request);

        let reply = Message::LookupReply {
            endpoint: Endpoint::new("127.0.0.1", 40000),
        };
        server.send(&reply).await.unwrap();
        assert_eq!(client.recv().await.unwrap(), reply);
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_class() {
        // Grab a port that is definitely closed
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = MessageStream::connect(&Endpoint::new("127.0.0.1", port), DEFAULT_IO_TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.is_connection_class());
        assert!(matches!(err, TzError::ConnectionRefused(_)));
    }

    #[tokio::test]
    async fn test_peer_close_is_eof() {
        let (mut client, server) = local_pair().await;
        drop(server);

        assert!(matches!(
            client.recv().await,
            Err(TzError::ConnectionLost)
        ));
    }

    #[tokio::test]
    async fn test_recv_or_eof_yields_none_on_close() {
        let (client, mut server) = local_pair().await;
        drop(client);

        assert!(matches!(server.recv_or_eof().await, Ok(None)));
    }

    #[tokio::test]
    async fn test_call_times_out_when_peer_is_silent() {
        let (mut client, _server) = local_pair().await;

        let err = client
            .call(&Message::ListRequest, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, TzError::Timeout(_)));
        assert!(err.is_connection_class());
    }
}
