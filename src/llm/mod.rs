pub mod enrich;
pub mod lmstudio;
pub mod parse;

use async_trait::async_trait;

use crate::error::AskError;

/// What the bridge distills out of one model response.
#[derive(Debug, Clone)]
pub struct GeneratedSql {
    pub sql: String,
    pub interpretation: String,
    pub source_url: Option<String>,
}

/// Translates a natural-language question into a SQL candidate.
///
/// The model is untrusted: it may hallucinate columns or return prose. A
/// bridge does strictly syntactic extraction; safety validation belongs to the
/// gate downstream so the two stay independently testable.
#[async_trait]
pub trait SqlBridge: Send + Sync {
    async fn generate(&self, question: &str) -> Result<GeneratedSql, AskError>;
}
