//! Label → keyword mapping for the classifier.
//!
//! Loaded once from a JSON object of the form `{"tabby": ["cat", "feline"]}`.

use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum KeywordMappingError {
    #[error("failed to read keyword mapping {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid keyword mapping: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(transparent)]
pub struct KeywordMapping(HashMap<String, Vec<String>>);

impl KeywordMapping {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KeywordMappingError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| KeywordMappingError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mapping = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), labels = mapping.len(), "Loaded keyword mapping");
        Ok(mapping)
    }

    pub fn from_json(json: &str) -> Result<Self, KeywordMappingError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Keywords for `label`, in file order.
    pub fn lookup(&self, label: &str) -> Option<&[String]> {
        self.0.get(label).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_preserves_keyword_order() {
        let mapping =
            KeywordMapping::from_json(r#"{"tabby": ["cat", "feline"], "golden_retriever": ["dog"]}"#)
                .unwrap();

        assert_eq!(mapping.len(), 2);
        assert_eq!(
            mapping.lookup("tabby").unwrap(),
            &["cat".to_string(), "feline".to_string()]
        );
        assert_eq!(mapping.lookup("golden_retriever").unwrap(), &["dog".to_string()]);
        assert!(mapping.lookup("toaster").is_none());
    }

    #[test]
    fn rejects_non_list_values() {
        let err = KeywordMapping::from_json(r#"{"tabby": "cat"}"#).unwrap_err();
        assert!(matches!(err, KeywordMappingError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = KeywordMapping::load(dir.path().join("keyword_mapping.json")).unwrap_err();
        assert!(matches!(err, KeywordMappingError::Read { .. }));
        assert!(err.to_string().contains("keyword_mapping.json"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyword_mapping.json");
        std::fs::write(&path, r#"{"tabby": ["кот"]}"#).unwrap();

        let mapping = KeywordMapping::load(&path).unwrap();
        assert_eq!(mapping.lookup("tabby").unwrap(), &["кот".to_string()]);
    }
}
