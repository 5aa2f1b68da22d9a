// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// A raw feed/API entry prior to classification. Constructed fresh on every
/// run; discarded after classification unless it becomes a news record.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CandidateItem {
    pub title: String,
    /// Description/snippet as reported by the source; may be truncated upstream.
    pub summary: String,
    /// Source-reported publication time, normalized to UTC at the provider.
    pub published_at: DateTime<Utc>,
    pub url: String,
}

/// A feed source (RSS document or search-API query) normalized into a finite,
/// restartable stream of candidates. A fresh fetch re-reads from the origin;
/// providers keep no state between calls.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>>;
    fn name(&self) -> &str;
}
