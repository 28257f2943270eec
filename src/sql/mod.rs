use regex::Regex;
use std::sync::LazyLock;

use crate::error::AskError;

static TRAILING_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+limit\s+\d+\s*;?\s*$").unwrap());

/// Keywords that mark a statement as a write or DDL, rejected as standalone
/// words only so identifiers like `updated_at` pass.
const BANNED_KEYWORDS: [&str; 12] = [
    "insert", "update", "delete", "drop", "alter", "create", "truncate", "grant", "revoke",
    "copy", "do", "call",
];

/// Read-only safety gate over candidate SQL.
///
/// This is a denylist, not a parser: it does not understand SQL grammar,
/// comments, or string literals, and is a best-effort guard rather than a
/// security boundary. A banned keyword inside a quoted literal is still
/// rejected; one split across comments could evade it.
#[derive(Debug, Clone)]
pub struct SqlGate {
    table: String,
}

impl SqlGate {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into().to_lowercase(),
        }
    }

    /// Accepts only a statement that starts with SELECT, carries no standalone
    /// write/DDL keyword, and mentions the permitted table.
    pub fn validate(&self, sql: &str) -> Result<(), AskError> {
        let normalized = sql.trim().to_lowercase();

        if !normalized.starts_with("select") {
            return Err(AskError::Rejected(
                "Only SELECT queries are allowed.".to_string(),
            ));
        }

        // Collapse all whitespace to single spaces, then pad with boundary
        // spaces so a `" keyword "` search matches standalone words only.
        let spaced = format!(" {} ", normalized.split_whitespace().collect::<Vec<_>>().join(" "));
        for keyword in BANNED_KEYWORDS {
            if spaced.contains(&format!(" {keyword} ")) {
                return Err(AskError::Rejected(
                    "Write/DDL statements are not allowed.".to_string(),
                ));
            }
        }

        if !normalized.contains(&self.table) {
            return Err(AskError::Rejected(format!(
                "Only queries against the {} table are allowed.",
                self.table
            )));
        }

        Ok(())
    }
}

/// Appends a `LIMIT n` clause when a row limit was requested.
///
/// With no limit the statement is returned unchanged, byte for byte. With a
/// limit, any existing trailing LIMIT clause is stripped first, so the policy
/// is last-wins: applying a limit twice yields exactly one clause.
pub fn apply_limit(sql: &str, limit: Option<u64>) -> String {
    let Some(limit) = limit else {
        return sql.to_string();
    };

    let base = TRAILING_LIMIT.replace(sql, "");
    let base = base.trim_end().trim_end_matches(';').trim_end();
    format!("{base} LIMIT {limit};")
}
