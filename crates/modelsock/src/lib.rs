//! modelsock: serve an expensive-to-load model over a framed Unix socket.

pub mod bridge;
pub mod client;
pub mod config;
pub mod engine;
pub mod server;
pub mod session;
pub mod telemetry;
mod version;

pub use bridge::codec::{FrameCodec, FrameError};
pub use bridge::protocol::{Flavor, Frame, SessionEnd, SessionId};
pub use client::{Client, ClientError};
pub use config::{ClassifierConfig, ConfigError, GeneratorConfig, ServerConfig};
pub use engine::{ComputeEngine, EngineError};
pub use server::{Server, shutdown_signal};
pub use session::Session;
pub use telemetry::init_tracing;
pub use version::{MODELSOCK_VERSION, VersionInfo};
