use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::AskError;

/// Reference links attached to a registry entry. The YAML may carry a single
/// URL or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Links {
    One(String),
    Many(Vec<String>),
}

impl Links {
    pub fn first(&self) -> Option<&str> {
        match self {
            Links::One(url) => Some(url.as_str()),
            Links::Many(urls) => urls.first().map(String::as_str),
        }
    }

    pub fn all(&self) -> Vec<String> {
        match self {
            Links::One(url) => vec![url.clone()],
            Links::Many(urls) => urls.clone(),
        }
    }
}

/// One curated question -> SQL mapping. Immutable after load.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryEntry {
    #[serde(alias = "natural_language_question")]
    pub question: String,
    #[serde(default, alias = "sql_query")]
    pub sql: Option<String>,
    #[serde(default, alias = "business_interpretation")]
    pub interpretation: Option<String>,
    #[serde(default, alias = "source_url", alias = "learn_more")]
    pub links: Option<Links>,
}

impl RegistryEntry {
    /// The entry's SQL, if it is present and non-blank.
    pub fn sql_text(&self) -> Option<&str> {
        self.sql
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// The curated query registry, loaded once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct QueryRegistry {
    entries: Vec<RegistryEntry>,
}

impl QueryRegistry {
    /// Loads the registry from a YAML document. The document must be a list of
    /// entries; anything else aborts startup rather than running with a
    /// degraded registry.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AskError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            AskError::Config(format!("{} not found or unreadable: {}", path.display(), e))
        })?;

        let doc: serde_yaml::Value = serde_yaml::from_str(&raw)
            .map_err(|e| AskError::Config(format!("{} is not valid YAML: {}", path.display(), e)))?;

        if !doc.is_sequence() {
            return Err(AskError::Config(format!(
                "{} must be a YAML list of entries",
                path.display()
            )));
        }

        let entries: Vec<RegistryEntry> = serde_yaml::from_value(doc)
            .map_err(|e| AskError::Config(format!("{} has a malformed entry: {}", path.display(), e)))?;

        info!("Loaded {} registry entries from {}", entries.len(), path.display());
        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    /// Trimmed, case-insensitive exact match on the question key. No fuzzy or
    /// partial matching.
    pub fn find(&self, question: &str) -> Option<&RegistryEntry> {
        let wanted = question.trim().to_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.question.trim().to_lowercase() == wanted)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
- natural_language_question: "What is the max close?"
  sql_query: "SELECT MAX(close) AS max_close FROM forex_bars"
  business_interpretation: "Highest closing price in range."
  source_url: "https://www.babypips.com/learn"
- question: "Which days moved the most?"
  links:
    - "https://www.fxstreet.com/a"
    - "https://www.fxstreet.com/b"
"#;

    fn sample_registry() -> QueryRegistry {
        let entries: Vec<RegistryEntry> = serde_yaml::from_str(SAMPLE).unwrap();
        QueryRegistry::from_entries(entries)
    }

    /// Aliased and canonical field names both deserialize.
    #[test]
    fn parses_aliased_fields() {
        let registry = sample_registry();
        assert_eq!(registry.len(), 2);

        let first = registry.find("What is the max close?").unwrap();
        assert_eq!(
            first.sql_text(),
            Some("SELECT MAX(close) AS max_close FROM forex_bars")
        );
        assert_eq!(
            first.links.as_ref().unwrap().first(),
            Some("https://www.babypips.com/learn")
        );
    }

    /// Lookup is exact but case-insensitive, with surrounding whitespace ignored.
    #[test]
    fn find_is_case_insensitive_exact() {
        let registry = sample_registry();
        assert!(registry.find("what is the MAX close?").is_some());
        assert!(registry.find("  WHAT IS THE MAX CLOSE?  ").is_some());
        // Partial questions never match.
        assert!(registry.find("What is the max").is_none());
    }

    /// An entry with no SQL (or blank SQL) reports none, which sends the
    /// orchestrator to the bridge.
    #[test]
    fn blank_sql_is_treated_as_missing() {
        let registry = sample_registry();
        let second = registry.find("Which days moved the most?").unwrap();
        assert_eq!(second.sql_text(), None);
        assert_eq!(second.links.as_ref().unwrap().all().len(), 2);
    }

    /// A YAML scalar (not a list) must be rejected at load.
    #[test]
    fn non_list_document_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.yml");
        std::fs::write(&path, "just a string").unwrap();
        assert!(matches!(
            QueryRegistry::load(&path),
            Err(AskError::Config(_))
        ));
    }

    /// A missing file must be rejected at load.
    #[test]
    fn missing_file_is_fatal() {
        assert!(matches!(
            QueryRegistry::load("no/such/registry.yml"),
            Err(AskError::Config(_))
        ));
    }
}
