//! Unix socket listener for the model server.
//!
//! Socket files live at a fixed path, normally relative to the working
//! directory. A file left behind by a previous run is removed before binding;
//! the file is not removed on exit.

use std::io;
use std::path::{Path, PathBuf};

use tokio::net::UnixListener;

/// Listening socket bound to a filesystem path.
pub struct SocketListener {
    path: PathBuf,
    listener: UnixListener,
}

impl SocketListener {
    /// Remove any stale socket file at `path`, then bind and listen.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(path: impl Into<PathBuf>) -> io::Result<Self> {
        use std::os::unix::net::UnixListener as StdUnixListener;

        let path = path.into();
        remove_stale_socket(&path)?;

        let std_listener = StdUnixListener::bind(&path)?;
        std_listener.set_nonblocking(true)?;
        let listener = UnixListener::from_std(std_listener)?;

        tracing::debug!(path = %path.display(), "Bound socket");
        Ok(Self { path, listener })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn accept(&self) -> io::Result<tokio::net::UnixStream> {
        let (stream, _) = self.listener.accept().await?;
        Ok(stream)
    }
}

/// Unlink `path`, treating "does not exist" as success.
pub fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed stale socket file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
