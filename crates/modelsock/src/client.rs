//! Client side of the socket protocol.
//!
//! One request in flight at a time, matching the server: send a frame, read
//! the frame that answers it.

use std::path::Path;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio_util::bytes::Bytes;
use tokio_util::codec::Framed;

use crate::bridge::codec::{FrameCodec, FrameError};
use crate::bridge::protocol::Frame;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("server closed the connection")]
    Closed,

    #[error("response is not valid UTF-8")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),

    /// The generation server never answers values of 0 or 1.
    #[error("generation length {0} gets no response, use send_control")]
    NoResponse(u32),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Frame(FrameError::Io(err))
    }
}

/// Split a classification response into ranked keyword groups.
pub fn parse_keyword_tiers(response: &str) -> Vec<Vec<String>> {
    if response.is_empty() {
        return Vec::new();
    }
    response
        .split(';')
        .map(|group| group.split(',').map(str::to_string).collect())
        .collect()
}

pub struct Client<S = UnixStream> {
    framed: Framed<S, FrameCodec>,
}

impl Client<UnixStream> {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        tracing::debug!(path = %path.as_ref().display(), "Connected");
        Ok(Self::new(stream))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, FrameCodec::new()),
        }
    }

    /// Send one payload frame and wait for its response.
    pub async fn request(&mut self, payload: impl Into<Bytes>) -> Result<String, ClientError> {
        self.framed.send(Frame::payload(payload)).await?;
        self.read_response().await
    }

    pub async fn classify(
        &mut self,
        image: impl Into<Bytes>,
    ) -> Result<Vec<Vec<String>>, ClientError> {
        let response = self.request(image).await?;
        Ok(parse_keyword_tiers(&response))
    }

    /// Ask for a sentence of at most `max_len` bytes.
    pub async fn generate(&mut self, max_len: u32) -> Result<String, ClientError> {
        if max_len <= 1 {
            return Err(ClientError::NoResponse(max_len));
        }
        self.send_control(max_len).await?;
        self.read_response().await
    }

    /// Write a bare length prefix without waiting for anything back.
    pub async fn send_control(&mut self, value: u32) -> Result<(), ClientError> {
        self.framed.send(Frame::Control(value)).await?;
        Ok(())
    }

    async fn read_response(&mut self) -> Result<String, ClientError> {
        match self.framed.next().await {
            Some(Ok(frame)) => {
                let bytes = match frame {
                    Frame::Payload(bytes) => bytes,
                    Frame::Control(_) => Bytes::new(),
                };
                String::from_utf8(bytes.to_vec()).map_err(ClientError::InvalidUtf8)
            }
            Some(Err(FrameError::TruncatedPayload { .. })) | None => Err(ClientError::Closed),
            Some(Err(e)) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn keyword_tiers() {
        assert_eq!(
            parse_keyword_tiers("cat,feline;tiger,cat;lynx"),
            vec![
                vec!["cat".to_string(), "feline".to_string()],
                vec!["tiger".to_string(), "cat".to_string()],
                vec!["lynx".to_string()],
            ]
        );
        assert!(parse_keyword_tiers("").is_empty());
    }

    #[tokio::test]
    async fn request_writes_frame_and_reads_reply() {
        let (client_io, mut server) = tokio::io::duplex(256);
        let mut client = Client::new(client_io);

        let peer = async move {
            let len = server.read_u32().await.unwrap();
            let mut payload = vec![0; len as usize];
            server.read_exact(&mut payload).await.unwrap();
            server.write_all(&[0, 0, 0, 2]).await.unwrap();
            server.write_all(b"ok").await.unwrap();
            payload
        };
        let (reply, sent) = tokio::join!(client.request(&b"hello"[..]), peer);

        assert_eq!(reply.unwrap(), "ok");
        assert_eq!(sent, b"hello");
    }

    #[tokio::test]
    async fn empty_classification_means_no_tiers() {
        let (client_io, mut server) = tokio::io::duplex(256);
        let mut client = Client::new(client_io);

        let peer = async move {
            let len = server.read_u32().await.unwrap();
            let mut payload = vec![0; len as usize];
            server.read_exact(&mut payload).await.unwrap();
            server.write_u32(0).await.unwrap();
        };
        let (tiers, ()) = tokio::join!(client.classify(vec![1u8, 2, 3]), peer);
        assert!(tiers.unwrap().is_empty());
    }

    #[tokio::test]
    async fn generate_sends_bare_prefix() {
        let (client_io, mut server) = tokio::io::duplex(256);
        let mut client = Client::new(client_io);

        let peer = async move {
            let keepalive = server.read_u32().await.unwrap();
            let max_len = server.read_u32().await.unwrap();
            server.write_u32(3).await.unwrap();
            server.write_all(b"hi.").await.unwrap();
            (keepalive, max_len)
        };
        let exchange = async {
            client.send_control(1).await.unwrap();
            client.generate(40).await
        };
        let (text, (keepalive, max_len)) = tokio::join!(exchange, peer);

        assert_eq!(text.unwrap(), "hi.");
        assert_eq!((keepalive, max_len), (1, 40));
    }

    #[tokio::test]
    async fn generate_refuses_unanswered_lengths() {
        let (client_io, _server) = tokio::io::duplex(16);
        let mut client = Client::new(client_io);
        let err = client.generate(1).await.unwrap_err();
        assert!(matches!(err, ClientError::NoResponse(1)));
    }

    #[tokio::test]
    async fn hang_up_is_closed() {
        let (client_io, mut server) = tokio::io::duplex(256);
        let mut client = Client::new(client_io);

        let peer = async move {
            let _ = server.read_u32().await.unwrap();
            drop(server);
        };
        let (reply, ()) = tokio::join!(client.generate(10), peer);
        assert!(matches!(reply, Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn non_utf8_reply_is_rejected() {
        let (client_io, mut server) = tokio::io::duplex(256);
        let mut client = Client::new(client_io);

        let peer = async move {
            let _ = server.read_u32().await.unwrap();
            server.write_all(&[0, 0, 0, 2, 0xff, 0xfe]).await.unwrap();
        };
        let (reply, ()) = tokio::join!(client.generate(10), peer);
        assert!(matches!(reply, Err(ClientError::InvalidUtf8(_))));
    }
}
