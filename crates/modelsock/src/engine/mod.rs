//! Compute engines behind the socket.
//!
//! An engine is built once at startup and then lent to one session at a time.

pub mod classify;
pub mod generate;
pub mod keywords;
pub mod markov;

use std::time::Duration;

use crate::bridge::protocol::{Flavor, Frame};

pub use classify::{ImageClassifier, ImageTensor, Label, LabelModel};
pub use generate::{RetryPolicy, TextGenerator};
pub use keywords::{KeywordMapping, KeywordMappingError};
pub use markov::{MarkovText, ModelError};

/// Per-request failures.
///
/// The session decides what the client sees: classification failures become
/// an empty response, generation failures close the connection.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Payload could not be decoded into the engine's input.
    #[error("failed to decode input: {message}")]
    Decode { message: String },

    /// The model itself failed.
    #[error("inference failed: {message}")]
    Inference { message: String },

    /// Model predicted a label the keyword mapping does not know.
    #[error("no keywords for label '{label}'")]
    UnknownLabel { label: String },

    /// Frame kind does not belong to this engine's flavor.
    #[error("unsupported request for {flavor} engine")]
    UnsupportedRequest { flavor: &'static str },

    #[error("no text produced after {attempts} attempts in {elapsed:?}")]
    GenerationTimeout { attempts: u32, elapsed: Duration },
}

impl EngineError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
        }
    }

    pub fn unsupported(flavor: Flavor) -> Self {
        Self::UnsupportedRequest {
            flavor: flavor.as_str(),
        }
    }
}

/// The expensive, stateful resource a server exists to keep loaded.
///
/// `process` is synchronous and runs on the server's only thread; a slow call
/// stalls every queued client.
pub trait ComputeEngine: 'static {
    /// Protocol variant this engine speaks.
    const FLAVOR: Flavor;

    fn process(&mut self, request: &Frame) -> Result<String, EngineError>;
}
