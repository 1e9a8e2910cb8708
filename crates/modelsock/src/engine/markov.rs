//! Word-level Markov chain text model.
//!
//! Reads the JSON written by markovify's `Text.to_json()`:
//!
//! ```text
//! {
//!   "state_size": 2,
//!   "chain": "[[[\"___BEGIN__\", \"___BEGIN__\"], {\"Hello\": 3}], ...]",
//!   "parsed_sentences": [["Hello", "world."], ...]   // or null
//! }
//! ```
//!
//! `chain` may be string-encoded (markovify's default) or inline, and each
//! state's transitions may be plain counts or the compiled
//! `[[words], [cumulative counts]]` form.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::Deserialize;

pub const BEGIN: &str = "___BEGIN__";
pub const END: &str = "___END__";

/// Walks per sentence, and sentences per short-sentence request.
pub const DEFAULT_TRIES: usize = 10;
pub const DEFAULT_MAX_OVERLAP_RATIO: f64 = 0.7;
pub const DEFAULT_MAX_OVERLAP_TOTAL: usize = 15;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read model {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state size must be at least 1")]
    ZeroStateSize,

    #[error("state {state:?} has {len} words, expected {expected}")]
    StateSize {
        state: Vec<String>,
        len: usize,
        expected: usize,
    },

    #[error("state {state:?} has no usable transitions")]
    EmptyTransitions { state: Vec<String> },

    #[error("chain has no starting state")]
    NoBeginState,
}

#[derive(Deserialize)]
struct ModelDump {
    state_size: usize,
    chain: ChainField,
    #[serde(default)]
    parsed_sentences: Option<Vec<Vec<String>>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChainField {
    Encoded(String),
    Inline(Vec<(Vec<String>, Transitions)>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Transitions {
    Counts(IndexMap<String, u64>),
    Compiled((Vec<String>, Vec<u64>)),
}

impl Transitions {
    fn into_pairs(self) -> Vec<(String, u64)> {
        match self {
            Self::Counts(counts) => counts.into_iter().collect(),
            Self::Compiled((words, cumulative)) => {
                let mut prev = 0;
                words
                    .into_iter()
                    .zip(cumulative)
                    .map(|(word, total)| {
                        let weight = total.saturating_sub(prev);
                        prev = total;
                        (word, weight)
                    })
                    .collect()
            }
        }
    }
}

struct Choices {
    words: Vec<String>,
    weights: WeightedIndex<u64>,
}

impl Choices {
    fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.words[self.weights.sample(rng)]
    }
}

/// Knobs for rejecting sentences that copy the source text.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OverlapLimits {
    max_ratio: f64,
    max_total: usize,
}

impl Default for OverlapLimits {
    fn default() -> Self {
        Self {
            max_ratio: DEFAULT_MAX_OVERLAP_RATIO,
            max_total: DEFAULT_MAX_OVERLAP_TOTAL,
        }
    }
}

pub struct MarkovText {
    state_size: usize,
    chain: HashMap<Vec<String>, Choices>,
    /// Source sentences joined with spaces; present when the dump kept them.
    rejoined: Option<String>,
    overlap: OverlapLimits,
}

impl std::fmt::Debug for MarkovText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkovText")
            .field("state_size", &self.state_size)
            .field("states", &self.chain.len())
            .field("retains_original", &self.rejoined.is_some())
            .finish()
    }
}

impl MarkovText {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let model = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            state_size = model.state_size(),
            retains_original = model.retains_original(),
            "Loaded Markov model"
        );
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let dump: ModelDump = serde_json::from_str(json)?;
        let entries: Vec<(Vec<String>, Transitions)> = match dump.chain {
            ChainField::Encoded(encoded) => serde_json::from_str(&encoded)?,
            ChainField::Inline(entries) => entries,
        };

        let mut chain = HashMap::with_capacity(entries.len());
        for (state, transitions) in entries {
            if state.len() != dump.state_size {
                return Err(ModelError::StateSize {
                    len: state.len(),
                    expected: dump.state_size,
                    state,
                });
            }
            let (words, weights): (Vec<String>, Vec<u64>) = transitions
                .into_pairs()
                .into_iter()
                .filter(|(_, weight)| *weight > 0)
                .unzip();
            let Ok(weights) = WeightedIndex::new(&weights) else {
                return Err(ModelError::EmptyTransitions { state });
            };
            chain.insert(state, Choices { words, weights });
        }

        Self::build(dump.state_size, chain, dump.parsed_sentences)
    }

    /// Build a model from raw sentences, one word list per sentence.
    pub fn from_sentences(
        state_size: usize,
        sentences: &[Vec<String>],
        retain_original: bool,
    ) -> Result<Self, ModelError> {
        let mut counts: IndexMap<Vec<String>, IndexMap<String, u64>> = IndexMap::new();
        for sentence in sentences {
            let mut items: Vec<&str> = vec![BEGIN; state_size];
            items.extend(sentence.iter().map(String::as_str));
            items.push(END);
            for window in items.windows(state_size + 1) {
                let state = window[..state_size].iter().map(|s| s.to_string()).collect();
                *counts
                    .entry(state)
                    .or_default()
                    .entry(window[state_size].to_string())
                    .or_default() += 1;
            }
        }

        let mut chain = HashMap::with_capacity(counts.len());
        for (state, next) in counts {
            let (words, weights): (Vec<String>, Vec<u64>) = next.into_iter().unzip();
            let Ok(weights) = WeightedIndex::new(&weights) else {
                return Err(ModelError::EmptyTransitions { state });
            };
            chain.insert(state, Choices { words, weights });
        }

        let parsed = retain_original.then(|| sentences.to_vec());
        Self::build(state_size, chain, parsed)
    }

    fn build(
        state_size: usize,
        chain: HashMap<Vec<String>, Choices>,
        parsed_sentences: Option<Vec<Vec<String>>>,
    ) -> Result<Self, ModelError> {
        if state_size == 0 {
            return Err(ModelError::ZeroStateSize);
        }
        if !chain.contains_key(&vec![BEGIN.to_string(); state_size]) {
            return Err(ModelError::NoBeginState);
        }

        let rejoined = parsed_sentences.map(|sentences| {
            sentences
                .iter()
                .map(|words| words.join(" "))
                .collect::<Vec<_>>()
                .join(" ")
        });

        Ok(Self {
            state_size,
            chain,
            rejoined,
            overlap: OverlapLimits::default(),
        })
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    pub fn retains_original(&self) -> bool {
        self.rejoined.is_some()
    }

    /// One random walk from the start state to the end marker.
    pub fn walk<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<&str> {
        let mut state: Vec<String> = vec![BEGIN.to_string(); self.state_size];
        let mut words = Vec::new();
        // A state missing from the chain ends the walk, like the end marker.
        while let Some(choices) = self.chain.get(&state) {
            let next = choices.pick(rng);
            if next == END {
                break;
            }
            words.push(next);
            state.remove(0);
            state.push(next.to_string());
        }
        words
    }

    /// Whether `words` reproduces a long run of the source text.
    fn copies_source(&self, words: &[&str]) -> bool {
        let Some(rejoined) = &self.rejoined else {
            return false;
        };
        let ratio_limit = (self.overlap.max_ratio * words.len() as f64).round_ties_even() as usize;
        let overlap_max = ratio_limit.min(self.overlap.max_total);
        let gram_len = overlap_max + 1;
        let gram_count = words.len().saturating_sub(overlap_max).max(1);

        (0..gram_count).any(|i| {
            let end = (i + gram_len).min(words.len());
            let gram = words[i..end].join(" ");
            rejoined.contains(&gram)
        })
    }

    /// A sentence that passes the overlap test, or None after `DEFAULT_TRIES`
    /// walks.
    pub fn make_sentence<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        for _ in 0..DEFAULT_TRIES {
            let words = self.walk(rng);
            if words.is_empty() {
                continue;
            }
            if !self.copies_source(&words) {
                return Some(words.join(" "));
            }
        }
        None
    }

    /// A sentence at most `max_bytes` long in UTF-8, or None after
    /// `DEFAULT_TRIES` sentence attempts.
    pub fn make_short_sentence<R: Rng + ?Sized>(
        &self,
        max_bytes: usize,
        rng: &mut R,
    ) -> Option<String> {
        (0..DEFAULT_TRIES)
            .filter_map(|_| self.make_sentence(rng))
            .find(|sentence| sentence.len() <= max_bytes)
    }
}
