//! One accepted connection and its request loop.
//!
//! Active: read frame → engine → write frame, repeat.
//! Closed: peer hang-up, truncated payload, oversized frame, I/O error, or a
//! generation engine that gave up. The stream is owned by the session and is
//! dropped exactly once when `run` returns, whichever way it ends.

use std::time::Instant;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::bytes::Bytes;
use tokio_util::codec::Framed;

use crate::bridge::codec::{FrameCodec, FrameError};
use crate::bridge::protocol::{Flavor, Frame, SessionEnd, SessionId};
use crate::engine::{ComputeEngine, EngineError};

impl From<FrameError> for SessionEnd {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::TruncatedPayload { expected, received } => {
                SessionEnd::Truncated { expected, received }
            }
            FrameError::FrameTooLarge { length, max } => SessionEnd::Oversized { length, max },
            FrameError::Io(e) => SessionEnd::Transport(e),
        }
    }
}

/// What the session does with one request.
#[derive(Debug)]
enum Reply {
    Send(String),
    /// Generation keepalive: request consumed, nothing written.
    Skip,
    Close(EngineError),
}

pub struct Session<'e, E, S> {
    id: SessionId,
    engine: &'e mut E,
    framed: Framed<S, FrameCodec>,
    requests: u64,
}

impl<'e, E, S> Session<'e, E, S>
where
    E: ComputeEngine,
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(engine: &'e mut E, stream: S, codec: FrameCodec) -> Self {
        Self {
            id: SessionId::new(),
            engine,
            framed: Framed::new(stream, codec),
            requests: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Serve requests until the connection ends.
    pub async fn run(mut self) -> SessionEnd {
        tracing::debug!(session = %self.id, flavor = E::FLAVOR.as_str(), "Session started");
        let end = loop {
            let request = match self.framed.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => break SessionEnd::from(e),
                None => break SessionEnd::PeerClosed,
            };
            self.requests += 1;

            let response = match self.respond(&request) {
                Reply::Send(text) => text,
                Reply::Skip => continue,
                Reply::Close(e) => break SessionEnd::EngineGaveUp(e),
            };

            tracing::trace!(session = %self.id, bytes = response.len(), "Writing response");
            if let Err(e) = self.framed.send(Bytes::from(response)).await {
                break SessionEnd::from(e);
            }
        };
        tracing::debug!(session = %self.id, requests = self.requests, %end, "Session ended");
        end
    }

    fn respond(&mut self, request: &Frame) -> Reply {
        let started = Instant::now();
        let reply = match (E::FLAVOR, request) {
            (Flavor::Generation, Frame::Control(value)) if *value <= 1 => {
                tracing::debug!(session = %self.id, value, "Ignoring generation request");
                return Reply::Skip;
            }
            (Flavor::Generation, _) => match self.engine.process(request) {
                Ok(text) => Reply::Send(text),
                Err(e) => {
                    tracing::error!(
                        session = %self.id,
                        error = %e,
                        "Generation failed, closing connection"
                    );
                    Reply::Close(e)
                }
            },
            (Flavor::Classification, _) => match self.engine.process(request) {
                Ok(text) => Reply::Send(text),
                Err(e) => {
                    tracing::warn!(
                        session = %self.id,
                        error = %e,
                        "Engine failed, answering with empty result"
                    );
                    Reply::Send(String::new())
                }
            },
        };
        tracing::debug!(
            session = %self.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request processed"
        );
        reply
    }
}
