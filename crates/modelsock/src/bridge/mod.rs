//! Wire layer for the model sockets.
//!
//! # Architecture
//!
//! - **protocol**: Frame, Flavor, SessionId, SessionEnd
//! - **codec**: length-prefixed framing codec for AsyncRead/AsyncWrite
//! - **transport**: Unix socket listener with stale-file cleanup

pub mod codec;
pub mod protocol;
pub mod transport;
