use regex::Regex;
use std::sync::LazyLock;

static SQL_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```sql\s*(.*?)```").unwrap());
static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:\w+)?\s*(.*?)```").unwrap());
static INTERPRETATION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*interpretation:\s*(.+)$").unwrap());
static SOURCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*source:\s*(\S+)\s*$").unwrap());
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://[^\s\)\]]+").unwrap());

/// Pulls the SQL candidate out of a model reply.
///
/// A ```sql fence is preferred, any fenced block is the fallback, and only the
/// text before the first statement terminator survives. No fence at all means
/// the reply is unusable.
pub fn extract_fenced_sql(content: &str) -> Option<String> {
    let block = SQL_FENCE
        .captures(content)
        .or_else(|| ANY_FENCE.captures(content))?;

    let sql = block.get(1)?.as_str().trim();
    // First statement only.
    let sql = sql.split(';').next().unwrap_or("").trim();
    Some(sql.to_string())
}

/// Reads an optional `Interpretation:` line, anchored at line start.
pub fn extract_interpretation(content: &str) -> Option<String> {
    INTERPRETATION_LINE
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Reads an optional `Source:` line holding a single token, anchored at line
/// start.
pub fn extract_source_url(content: &str) -> Option<String> {
    SOURCE_LINE
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Harvests plain or Markdown-wrapped URLs, stripping trailing punctuation.
pub fn extract_urls(text: &str) -> Vec<String> {
    URL.find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ')', ';', ']']).to_string())
        .collect()
}
