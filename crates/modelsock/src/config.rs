//! Startup configuration.
//!
//! Defaults match the historical deployment (socket and data files in the
//! working directory). Each value can be overridden from the environment:
//!
//! | Variable                    | Meaning                               |
//! |-----------------------------|---------------------------------------|
//! | `MODELSOCK_SOCKET`          | socket path                           |
//! | `MODELSOCK_MAX_FRAME`       | max inbound payload bytes, 0 = no cap |
//! | `MODELSOCK_KEYWORDS`        | keyword mapping JSON                  |
//! | `MODELSOCK_TOP_K`           | ranked labels mapped to keywords      |
//! | `MODELSOCK_MODEL`           | Markov model JSON                     |
//! | `MODELSOCK_GEN_ATTEMPTS`    | generation attempts, 0 = unbounded    |
//! | `MODELSOCK_GEN_DEADLINE_MS` | generation deadline, 0 = unbounded    |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::bridge::protocol::Flavor;
use crate::engine::RetryPolicy;
use crate::engine::classify::DEFAULT_TOP_K;

pub const ENV_SOCKET: &str = "MODELSOCK_SOCKET";
pub const ENV_MAX_FRAME: &str = "MODELSOCK_MAX_FRAME";
pub const ENV_KEYWORDS: &str = "MODELSOCK_KEYWORDS";
pub const ENV_TOP_K: &str = "MODELSOCK_TOP_K";
pub const ENV_MODEL: &str = "MODELSOCK_MODEL";
pub const ENV_GEN_ATTEMPTS: &str = "MODELSOCK_GEN_ATTEMPTS";
pub const ENV_GEN_DEADLINE_MS: &str = "MODELSOCK_GEN_DEADLINE_MS";

#[derive(Debug, thiserror::Error)]
#[error("invalid value '{value}' for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Source of configuration values, `std::env::var` in production.
pub trait Lookup {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
pub struct Env;

impl Lookup for Env {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl<F: Fn(&str) -> Option<String>> Lookup for F {
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

fn parse_var<T>(lookup: &impl Lookup, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup.get(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError {
                var,
                reason: e.to_string(),
                value,
            }),
    }
}

/// Zero means "no limit".
fn nonzero<T: PartialEq + Default>(value: T) -> Option<T> {
    (value != T::default()).then_some(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// Inbound payloads above this are rejected and the connection dropped.
    pub max_frame_length: Option<usize>,
}

impl ServerConfig {
    pub fn new(flavor: Flavor) -> Self {
        Self {
            socket_path: PathBuf::from(flavor.default_socket_name()),
            max_frame_length: None,
        }
    }

    pub fn from_env(flavor: Flavor) -> Result<Self, ConfigError> {
        Self::from_lookup(flavor, &Env)
    }

    pub fn from_lookup(flavor: Flavor, lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let mut config = Self::new(flavor);
        if let Some(path) = lookup.get(ENV_SOCKET) {
            config.socket_path = PathBuf::from(path);
        }
        if let Some(max) = parse_var::<usize>(lookup, ENV_MAX_FRAME)? {
            config.max_frame_length = nonzero(max);
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub keyword_mapping: PathBuf,
    pub top_k: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keyword_mapping: PathBuf::from("keyword_mapping.json"),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ClassifierConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&Env)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = lookup.get(ENV_KEYWORDS) {
            config.keyword_mapping = PathBuf::from(path);
        }
        if let Some(top_k) = parse_var::<usize>(lookup, ENV_TOP_K)? {
            if top_k == 0 {
                return Err(ConfigError {
                    var: ENV_TOP_K,
                    value: top_k.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            config.top_k = top_k;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub model_path: PathBuf,
    pub retry: RetryPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("randmodel.json"),
            retry: RetryPolicy::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&Env)
    }

    pub fn from_lookup(lookup: &impl Lookup) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = lookup.get(ENV_MODEL) {
            config.model_path = PathBuf::from(path);
        }
        if let Some(attempts) = parse_var::<u32>(lookup, ENV_GEN_ATTEMPTS)? {
            config.retry.max_attempts = nonzero(attempts);
        }
        if let Some(ms) = parse_var::<u64>(lookup, ENV_GEN_DEADLINE_MS)? {
            config.retry.deadline = nonzero(ms).map(Duration::from_millis);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn server_defaults_per_flavor() {
        let config = ServerConfig::from_lookup(Flavor::Classification, &vars(&[])).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("imclassif.sock"));
        assert_eq!(config.max_frame_length, None);

        let config = ServerConfig::new(Flavor::Generation);
        assert_eq!(config.socket_path, PathBuf::from("randtext.sock"));
    }

    #[test]
    fn server_env_overrides() {
        let lookup = vars(&[(ENV_SOCKET, "/run/joe/img.sock"), (ENV_MAX_FRAME, "1048576")]);
        let config = ServerConfig::from_lookup(Flavor::Classification, &lookup).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/run/joe/img.sock"));
        assert_eq!(config.max_frame_length, Some(1 << 20));
    }

    #[test]
    fn zero_max_frame_means_no_cap() {
        let lookup = vars(&[(ENV_MAX_FRAME, "0")]);
        let config = ServerConfig::from_lookup(Flavor::Classification, &lookup).unwrap();
        assert_eq!(config.max_frame_length, None);
    }

    #[test]
    fn invalid_number_is_an_error() {
        let lookup = vars(&[(ENV_MAX_FRAME, "lots")]);
        let err = ServerConfig::from_lookup(Flavor::Classification, &lookup).unwrap_err();
        assert_eq!(err.var, ENV_MAX_FRAME);
        assert_eq!(err.value, "lots");
        assert!(err.to_string().starts_with("invalid value 'lots' for MODELSOCK_MAX_FRAME"));
    }

    #[test]
    fn classifier_defaults_and_override() {
        let config = ClassifierConfig::from_lookup(&vars(&[])).unwrap();
        assert_eq!(config.keyword_mapping, PathBuf::from("keyword_mapping.json"));
        assert_eq!(config.top_k, 3);

        let lookup = vars(&[(ENV_KEYWORDS, "kw.json"), (ENV_TOP_K, "5")]);
        let config = ClassifierConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.keyword_mapping, PathBuf::from("kw.json"));
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn invalid_top_k_is_an_error() {
        let err = ClassifierConfig::from_lookup(&vars(&[(ENV_TOP_K, "three")])).unwrap_err();
        assert_eq!(err.var, ENV_TOP_K);
        assert_eq!(err.value, "three");

        let err = ClassifierConfig::from_lookup(&vars(&[(ENV_TOP_K, "0")])).unwrap_err();
        assert_eq!(err.to_string(), "invalid value '0' for MODELSOCK_TOP_K: must be at least 1");
    }

    #[test]
    fn generator_retry_overrides() {
        let config = GeneratorConfig::from_lookup(&vars(&[])).unwrap();
        assert_eq!(config.model_path, PathBuf::from("randmodel.json"));
        assert_eq!(config.retry, RetryPolicy::default());

        let lookup = vars(&[
            (ENV_MODEL, "chain.json"),
            (ENV_GEN_ATTEMPTS, "0"),
            (ENV_GEN_DEADLINE_MS, "250"),
        ]);
        let config = GeneratorConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.model_path, PathBuf::from("chain.json"));
        assert_eq!(config.retry.max_attempts, None);
        assert_eq!(config.retry.deadline, Some(Duration::from_millis(250)));
    }

    #[test]
    fn fully_unbounded_generation() {
        let lookup = vars(&[(ENV_GEN_ATTEMPTS, "0"), (ENV_GEN_DEADLINE_MS, "0")]);
        let config = GeneratorConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.retry, RetryPolicy::unbounded());
    }
}
