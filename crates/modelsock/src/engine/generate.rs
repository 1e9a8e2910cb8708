//! Text generation engine.
//!
//! The request is a maximum length in bytes. The engine keeps asking the
//! Markov model for a short sentence until one fits, within the retry policy.

use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::SmallRng;

use super::markov::MarkovText;
use super::{ComputeEngine, EngineError};
use crate::bridge::protocol::{Flavor, Frame};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Bounds on "retry until the model produces something".
///
/// `None` disables a bound; with both disabled the engine retries forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            deadline: Some(DEFAULT_DEADLINE),
        }
    }
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            deadline: None,
        }
    }

    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.deadline.is_some_and(|deadline| elapsed >= deadline)
    }
}

pub struct TextGenerator<R = SmallRng> {
    model: MarkovText,
    rng: R,
    retry: RetryPolicy,
}

impl TextGenerator<SmallRng> {
    pub fn new(model: MarkovText) -> Self {
        Self::with_rng(model, SmallRng::from_entropy())
    }
}

impl<R: rand::Rng> TextGenerator<R> {
    pub fn with_rng(model: MarkovText, rng: R) -> Self {
        Self {
            model,
            rng,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn generate(&mut self, max_bytes: usize) -> Result<String, EngineError> {
        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts = attempts.saturating_add(1);
            if let Some(text) = self.model.make_short_sentence(max_bytes, &mut self.rng) {
                tracing::debug!(attempts, bytes = text.len(), "Generated text");
                return Ok(text);
            }

            let elapsed = started.elapsed();
            if self.retry.exhausted(attempts, elapsed) {
                return Err(EngineError::GenerationTimeout { attempts, elapsed });
            }
            tracing::trace!(attempts, max_bytes, "No sentence fit, retrying");
        }
    }
}

impl<R: rand::Rng + 'static> ComputeEngine for TextGenerator<R> {
    const FLAVOR: Flavor = Flavor::Generation;

    fn process(&mut self, request: &Frame) -> Result<String, EngineError> {
        match request {
            Frame::Control(max_len) => {
                tracing::info!(max_len, "Received a request to generate random text");
                self.generate(*max_len as usize)
            }
            Frame::Payload(_) => Err(EngineError::unsupported(Self::FLAVOR)),
        }
    }
}
