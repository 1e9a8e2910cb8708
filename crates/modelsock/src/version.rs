//! Version information logged at startup.

/// modelsock version from Cargo.toml
pub const MODELSOCK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Versions of the server and the runtime hosting its model.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionInfo {
    pub modelsock: &'static str,
    /// Embedded Python interpreter, when the engine runs one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<String>,
    /// Keras, for the classification engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keras: Option<String>,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            modelsock: MODELSOCK_VERSION,
            python: None,
            keras: None,
        }
    }
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_python(mut self, version: String) -> Self {
        self.python = Some(version);
        self
    }

    pub fn with_keras(mut self, version: String) -> Self {
        self.keras = Some(version);
        self
    }

    /// Log at info level, one field per known component.
    pub fn log(&self) {
        tracing::info!(
            modelsock = self.modelsock,
            python = self.python.as_deref(),
            keras = self.keras.as_deref(),
            "Starting modelsock {}",
            self.modelsock
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_crate_version_only() {
        let info = VersionInfo::new();
        assert_eq!(info.modelsock, MODELSOCK_VERSION);
        assert!(info.python.is_none());
        assert!(info.keras.is_none());
    }

    #[test]
    fn serializes_minimal() {
        let info = VersionInfo {
            modelsock: "0.1.0",
            python: None,
            keras: None,
        };
        insta::assert_json_snapshot!(info, @r#"
        {
          "modelsock": "0.1.0"
        }
        "#);
    }

    #[test]
    fn serializes_full() {
        let info = VersionInfo {
            modelsock: "0.1.0",
            ..VersionInfo::new()
        }
        .with_python("3.11.4".to_string())
        .with_keras("2.15.0".to_string());
        insta::assert_json_snapshot!(info, @r#"
        {
          "modelsock": "0.1.0",
          "python": "3.11.4",
          "keras": "2.15.0"
        }
        "#);
    }
}
