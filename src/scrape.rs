// src/scrape.rs
// Confirmatory pass: fetch the full article page for a provisionally
// relevant candidate, extract its paragraph text, and re-classify on the
// full text. The verdict produced here always wins, including the company
// name; it may keep the provisional topic, reassign it, or return none.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use scraper::{Html, Selector};
use tracing::warn;

use crate::classify::backend::ChatBackend;
use crate::classify::extract::extract_verdict;
use crate::classify::ClassificationVerdict;
use crate::ingest::types::CandidateItem;

/// Bound on the article text handed to the model.
pub const MAX_ARTICLE_CHARS: usize = 1000;

/// The confirmatory capability as the pipeline sees it. Only invoked for
/// non-none provisional topics; the verdict it returns is final.
#[async_trait]
pub trait ConfirmationStep: Send + Sync {
    async fn confirm(
        &self,
        item: &CandidateItem,
        provisional: &ClassificationVerdict,
    ) -> ClassificationVerdict;
}

const CONFIRM_SYSTEM: &str = "\
You are an analyst of business news reading the FULL TEXT of an article. \
A first pass proposed a topic; confirm it against the full text. You may keep \
the proposed topic, replace it with a better-fitting one of the other two, or \
return \"none\" if the article does not actively describe any of them. The \
three topics are: the founding of a new company (\"new_company\"), large-scale \
hiring by a company (\"mass_hiring\"), and a company moving its headquarters \
(\"relocation\"). Articles about funding rounds, revenue or profit are NEVER \
assigned a topic, no matter how large the sums mentioned. Respond with a \
single JSON object and nothing else, in this exact shape: \
{\"topic\": \"new_company|mass_hiring|relocation|none\", \
\"company\": \"company name, comma-separated if several, or unknown\", \
\"sector\": \"business sector or unknown\", \
\"locale\": \"domestic|international|unknown\", \
\"region\": \"city or region, or unknown\", \
\"details\": \"one short sentence summarizing the event\", \
\"rationale\": \"one short sentence explaining the decision\"}";

pub struct ArticleScraper {
    http: reqwest::Client,
    backend: Arc<dyn ChatBackend>,
    max_chars: usize,
}

impl ArticleScraper {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; company-news-radar/0.1)")
            .connect_timeout(std::time::Duration::from_secs(4))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            http,
            backend,
            max_chars: MAX_ARTICLE_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    async fn fetch_article(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("article get()")?
            .error_for_status()
            .context("article status")?;
        resp.text().await.context("article .text()")
    }
}

#[async_trait]
impl ConfirmationStep for ArticleScraper {
    /// Confirm or override a provisional verdict. Every failure mode (fetch
    /// error, empty extraction, malformed model reply) collapses to the
    /// terminal none verdict: the item is dropped, the run continues.
    async fn confirm(
        &self,
        item: &CandidateItem,
        provisional: &ClassificationVerdict,
    ) -> ClassificationVerdict {
        let t0 = std::time::Instant::now();
        let body = match self.fetch_article(&item.url).await {
            Ok(b) => b,
            Err(e) => {
                warn!(url = %item.url, title = %item.title, error = ?e, "scrape fetch failed");
                counter!("scrape_failures_total").increment(1);
                return ClassificationVerdict::none("scrape failed: fetch error");
            }
        };

        let text = truncate_chars(&extract_paragraph_text(&body), self.max_chars);
        if text.trim().is_empty() {
            warn!(url = %item.url, title = %item.title, "scrape extracted no text");
            counter!("scrape_failures_total").increment(1);
            return ClassificationVerdict::none("scrape failed: no extractable text");
        }

        let user = format!(
            "Proposed topic: {}\nTitular: {}\nFull text: {}",
            provisional.topic.label(),
            item.title,
            text
        );
        let verdict = match self.backend.complete(CONFIRM_SYSTEM, &user).await {
            Ok(raw) => match extract_verdict(&raw) {
                Ok(v) => v,
                Err(e) => {
                    warn!(url = %item.url, title = %item.title, error = ?e, "confirm reply unparseable");
                    counter!("scrape_failures_total").increment(1);
                    ClassificationVerdict::none("scrape failed: unparseable confirmation")
                }
            },
            Err(e) => {
                warn!(url = %item.url, title = %item.title, error = ?e, "confirm backend call failed");
                counter!("scrape_failures_total").increment(1);
                ClassificationVerdict::none("scrape failed: backend error")
            }
        };
        histogram!("scrape_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        if verdict.topic != provisional.topic {
            tracing::info!(
                url = %item.url,
                provisional = provisional.topic.label(),
                confirmed = verdict.topic.label(),
                "confirmatory pass changed topic"
            );
        }
        verdict
    }
}

/// All paragraph-level text nodes, concatenated with single spaces.
pub fn extract_paragraph_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let p = Selector::parse("p").expect("static selector");
    let mut parts: Vec<String> = Vec::new();
    for el in doc.select(&p) {
        let t: String = el.text().collect::<Vec<_>>().join(" ");
        let t = t.split_whitespace().collect::<Vec<_>>().join(" ");
        if !t.is_empty() {
            parts.push(t);
        }
    }
    parts.join(" ")
}

/// Char-boundary-safe truncation with a trailing ellipsis marker.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('\u{2026}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_join_with_single_spaces() {
        let html = "<html><body><h1>Head</h1><p>First   para.</p><div><p>Second <b>bold</b> para.</p></div></body></html>";
        assert_eq!(
            extract_paragraph_text(html),
            "First para. Second bold para."
        );
    }

    #[test]
    fn no_paragraphs_yields_empty() {
        assert_eq!(extract_paragraph_text("<html><body><div>x</div></body></html>"), "");
    }

    #[test]
    fn truncation_appends_ellipsis() {
        let long = "a".repeat(1200);
        let out = truncate_chars(&long, MAX_ARTICLE_CHARS);
        assert_eq!(out.chars().count(), MAX_ARTICLE_CHARS + 1);
        assert!(out.ends_with('\u{2026}'));

        let short = "short text";
        assert_eq!(truncate_chars(short, MAX_ARTICLE_CHARS), short);
    }

    #[test]
    fn truncation_respects_multibyte_chars() {
        let s = "ñ".repeat(50);
        let out = truncate_chars(&s, 10);
        assert_eq!(out.chars().count(), 11);
    }
}
