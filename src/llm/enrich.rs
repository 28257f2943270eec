use std::time::Duration;
use tracing::debug;

use crate::error::AskError;
use crate::llm::lmstudio::LmStudioBridge;
use crate::llm::parse;

const PROBE_USER_AGENT: &str = "FXLens/1.0 (+https://local)";

/// Optional enrichment around a best-effort answer: a business-level reading of
/// the question and a handful of reference links that actually resolve.
impl LmStudioBridge {
    /// Asks for a concise, non-technical explanation of the request.
    pub async fn interpret_business(&self, question: &str) -> Result<String, AskError> {
        let prompt = format!(
            "Explain in 3-6 sentences what the following FX analytics request means in business terms. \
             Avoid SQL language. Be specific, action-oriented, and useful for a trader or pricing analyst.\n\n\
             Request:\n{question}"
        );
        let content = self.raw_completion(prompt).await?;
        Ok(content.trim().to_string())
    }

    /// Asks the model for reference URLs, then keeps only the ones that resolve
    /// over HTTP. Probing is side-effecting and bounded by short timeouts; a
    /// probe failure only drops that link, never the answer.
    pub async fn suggest_learn_more_links(&self, topic: &str, max_links: usize) -> Vec<String> {
        let prompt = format!(
            "Give 2-3 credible, directly relevant webpages (full URLs) where someone can learn more about \
             this topic:\n\n{topic}\n\n\
             Rules:\n\
             - ONLY output raw URLs, one per line (no text, no markdown).\n\
             - Prefer authoritative FX education sources.\n\
             - Links must be directly about the topic, not generic homepages."
        );

        let raw = match self.raw_completion(prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Link suggestion call failed: {}", e);
                return Vec::new();
            }
        };

        let mut seen = std::collections::HashSet::new();
        let mut valid = Vec::new();
        for url in parse::extract_urls(&raw) {
            if !seen.insert(url.clone()) {
                continue;
            }
            if probe_url(&url).await {
                valid.push(url);
            }
            if valid.len() >= max_links {
                break;
            }
        }
        valid
    }
}

/// Best-effort HTTP reachability check: HEAD first, GET as fallback for sites
/// that block HEAD. Success means a non-4xx/5xx status with an HTML-ish
/// content type.
pub async fn probe_url(url: &str) -> bool {
    let Ok(client) = reqwest::Client::builder()
        .user_agent(PROBE_USER_AGENT)
        .build()
    else {
        return false;
    };

    if let Ok(resp) = client
        .head(url)
        .timeout(Duration::from_secs(6))
        .send()
        .await
    {
        if resp.status().is_success() && is_html(&resp) {
            return true;
        }
    }

    match client.get(url).timeout(Duration::from_secs(8)).send().await {
        Ok(resp) => resp.status().is_success() && is_html(&resp),
        Err(_) => false,
    }
}

fn is_html(resp: &reqwest::Response) -> bool {
    resp.headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let ct = ct.to_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml+xml")
        })
        .unwrap_or(false)
}
