//! Accept loop: one engine, one connection at a time.
//!
//! Clients that connect while a session is active wait in the listen backlog
//! until it ends.

use std::future::Future;
use std::io;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::bridge::codec::FrameCodec;
use crate::bridge::protocol::SessionEnd;
use crate::bridge::transport::SocketListener;
use crate::config::ServerConfig;
use crate::engine::ComputeEngine;
use crate::session::Session;

pub struct Server<E> {
    listener: SocketListener,
    engine: E,
    config: ServerConfig,
}

/// Accept errors caused by a single misbehaving peer rather than the listener.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

impl<E: ComputeEngine> Server<E> {
    /// Bind the socket for an already constructed engine.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: ServerConfig, engine: E) -> io::Result<Self> {
        let listener = SocketListener::bind(&config.socket_path)?;
        tracing::info!(
            path = %listener.path().display(),
            flavor = E::FLAVOR.as_str(),
            max_frame_length = ?config.max_frame_length,
            "Listening on socket"
        );
        Ok(Self {
            listener,
            engine,
            config,
        })
    }

    pub fn path(&self) -> &Path {
        self.listener.path()
    }

    fn codec(&self) -> FrameCodec {
        let codec = FrameCodec::for_flavor(E::FLAVOR);
        match self.config.max_frame_length {
            Some(max) => codec.max_length(max),
            None => codec,
        }
    }

    /// Run one session over `stream` to completion.
    pub async fn serve_one<S>(&mut self, stream: S) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let codec = self.codec();
        let session = Session::new(&mut self.engine, stream, codec);
        let id = session.id();
        let end = session.run().await;

        match &end {
            SessionEnd::PeerClosed => tracing::info!(session = %id, "Connection closed"),
            SessionEnd::EngineGaveUp(_) => {
                tracing::error!(session = %id, reason = %end, "Connection dropped")
            }
            _ => tracing::warn!(session = %id, reason = %end, "Connection dropped"),
        }
        end
    }

    /// Accept and serve clients sequentially, forever.
    ///
    /// Returns only if the listener itself fails.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            let stream = match self.listener.accept().await {
                Ok(stream) => stream,
                Err(e) if is_transient(&e) => {
                    tracing::warn!(error = %e, "Accept failed, continuing");
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Accept failed");
                    return Err(e);
                }
            };
            tracing::info!("Accepted connection");
            self.serve_one(stream).await;
        }
    }

    /// Like [`run`](Self::run), but return once `shutdown` completes.
    ///
    /// An active session is dropped, closing its connection. The socket file
    /// stays in place.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> io::Result<()> {
        tokio::select! {
            result = self.run() => result,
            () = shutdown => {
                tracing::info!("Server shutdown complete");
                Ok(())
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed, which only happens when
/// called outside a tokio runtime.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler - is tokio runtime configured correctly?");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler - is tokio runtime configured correctly?")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
