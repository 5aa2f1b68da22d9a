// src/dedup.rs
// Pairwise semantic deduplication of the items accepted in one run. Each
// candidate is compared, in order, against every already-accepted item; the
// first match absorbs the candidate's source URLs. O(n^2) judge calls,
// fine for the tens of items a run produces; callers must not assume better.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::classify::backend::ChatBackend;
use crate::classify::extract::extract_verdict_span;
use crate::store::NewsRecord;

const JUDGE_SYSTEM: &str = "\
You compare two business news items and decide whether they report the SAME \
underlying event (same company, same action), even if worded differently or \
published by different outlets. Respond with a single JSON object and nothing \
else: {\"duplicate\": true or false, \"rationale\": \"one short sentence\"}";

#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateVerdict {
    pub duplicate: bool,
    #[serde(default)]
    pub rationale: String,
}

/// Same-event judgment between two records, by title + details.
/// Pluggable so the LLM comparator can be swapped for, e.g., an
/// embedding-similarity clusterer later.
#[async_trait]
pub trait DuplicateJudge: Send + Sync {
    async fn is_duplicate(&self, a: &NewsRecord, b: &NewsRecord) -> Result<DuplicateVerdict>;
}

pub struct ChatDuplicateJudge {
    backend: Arc<dyn ChatBackend>,
}

impl ChatDuplicateJudge {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl DuplicateJudge for ChatDuplicateJudge {
    async fn is_duplicate(&self, a: &NewsRecord, b: &NewsRecord) -> Result<DuplicateVerdict> {
        let user = format!(
            "Item A:\n  title: {}\n  details: {}\nItem B:\n  title: {}\n  details: {}",
            a.title, a.details, b.title, b.details
        );
        let raw = self
            .backend
            .complete(JUDGE_SYSTEM, &user)
            .await
            .context("duplicate judge call")?;
        let span = extract_verdict_span(&raw).context("locating judge JSON")?;
        let verdict: DuplicateVerdict =
            serde_json::from_str(span).context("parsing judge JSON")?;
        Ok(verdict)
    }
}

/// Collapse same-event records. Original order is preserved for survivors;
/// a merged-away record's URLs are folded into the first accepted match.
/// A failed judgment counts as "not duplicate" so distinct news is never
/// collapsed by a comparator error.
pub async fn dedupe(items: Vec<NewsRecord>, judge: &dyn DuplicateJudge) -> Vec<NewsRecord> {
    let mut accepted: Vec<NewsRecord> = Vec::with_capacity(items.len());

    'candidates: for item in items {
        for kept in accepted.iter_mut() {
            let verdict = match judge.is_duplicate(kept, &item).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(title = %item.title, error = ?e, "duplicate judgment failed, keeping both");
                    counter!("dedup_judge_failures_total").increment(1);
                    DuplicateVerdict {
                        duplicate: false,
                        rationale: String::new(),
                    }
                }
            };
            if verdict.duplicate {
                debug!(
                    survivor = %kept.title,
                    merged = %item.title,
                    rationale = %verdict.rationale,
                    "merging duplicate"
                );
                kept.merge_urls(&item.urls);
                counter!("dedup_merged_total").increment(1);
                continue 'candidates;
            }
        }
        accepted.push(item);
    }

    accepted
}
