// src/store/mod.rs
// Persistence gateway: three logical collections (news, companies, and the
// singleton ingest watermark) behind one async trait, so the document store
// is swappable and the pipeline testable against an in-memory double.

pub mod json_file;

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{Locale, Topic};

/// Separator for merged source URLs inside one news record.
pub const URL_SEPARATOR: &str = " | ";

/// A classified, confirmed news item. Written once at end of run; after the
/// dedup merge its `urls` field may carry the union of several origin URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub company: String,
    pub title: String,
    pub topic: Topic,
    pub published_at: DateTime<Utc>,
    pub locale: Locale,
    pub region: String,
    /// One or more source URLs joined by [`URL_SEPARATOR`]. Never empty.
    pub urls: String,
    pub details: String,
}

impl NewsRecord {
    /// Union of this record's URLs with `incoming`, rejoined on the fixed
    /// separator. URL order after the rejoin is unspecified.
    pub fn merge_urls(&mut self, incoming: &str) {
        let set: std::collections::BTreeSet<String> = self
            .urls
            .split(URL_SEPARATOR)
            .chain(incoming.split(URL_SEPARATOR))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if set.is_empty() {
            return;
        }
        self.urls = set.into_iter().collect::<Vec<_>>().join(URL_SEPARATOR);
    }
}

/// One row per distinct company name, created lazily the first time a
/// qualifying news item references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub name: String,
    pub sector: String,
    pub details: String,
}

#[async_trait]
pub trait RadarStore: Send + Sync {
    async fn insert_news(&self, record: &NewsRecord) -> Result<()>;
    async fn recent_news(&self, limit: usize) -> Result<Vec<NewsRecord>>;

    async fn find_company(&self, name: &str) -> Result<Option<CompanyRecord>>;
    async fn insert_company(&self, company: &CompanyRecord) -> Result<()>;

    /// Published-at of the most recent successfully-ingested item, if any run
    /// has completed with accepted items.
    async fn last_run(&self) -> Result<Option<DateTime<Utc>>>;
    /// Advance the watermark to the max of `candidates`, never decreasing it.
    /// An empty slice is an explicit no-op so empty runs cannot regress it.
    async fn advance_last_run(&self, candidates: &[DateTime<Utc>]) -> Result<()>;
}

/// Watermark advance rule shared by store implementations. Returns the value
/// to write, or None when nothing should be written.
pub fn next_watermark(
    current: Option<DateTime<Utc>>,
    candidates: &[DateTime<Utc>],
) -> Option<DateTime<Utc>> {
    let max = candidates.iter().max().copied()?;
    match current {
        Some(cur) if cur >= max => None,
        _ => Some(max),
    }
}

/// In-memory store for tests and local experiments.
#[derive(Default)]
pub struct MemoryStore {
    news: Mutex<Vec<NewsRecord>>,
    companies: Mutex<Vec<CompanyRecord>>,
    watermark: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn news_snapshot(&self) -> Vec<NewsRecord> {
        self.news.lock().expect("news mutex poisoned").clone()
    }

    pub fn companies_snapshot(&self) -> Vec<CompanyRecord> {
        self.companies
            .lock()
            .expect("companies mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl RadarStore for MemoryStore {
    async fn insert_news(&self, record: &NewsRecord) -> Result<()> {
        self.news
            .lock()
            .expect("news mutex poisoned")
            .push(record.clone());
        Ok(())
    }

    async fn recent_news(&self, limit: usize) -> Result<Vec<NewsRecord>> {
        let v = self.news.lock().expect("news mutex poisoned");
        let start = v.len().saturating_sub(limit);
        Ok(v[start..].to_vec())
    }

    async fn find_company(&self, name: &str) -> Result<Option<CompanyRecord>> {
        let v = self.companies.lock().expect("companies mutex poisoned");
        Ok(v.iter().find(|c| c.name == name).cloned())
    }

    async fn insert_company(&self, company: &CompanyRecord) -> Result<()> {
        self.companies
            .lock()
            .expect("companies mutex poisoned")
            .push(company.clone());
        Ok(())
    }

    async fn last_run(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(*self.watermark.lock().expect("watermark mutex poisoned"))
    }

    async fn advance_last_run(&self, candidates: &[DateTime<Utc>]) -> Result<()> {
        let mut g = self.watermark.lock().expect("watermark mutex poisoned");
        if let Some(next) = next_watermark(*g, candidates) {
            *g = Some(next);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn watermark_empty_candidates_is_noop() {
        assert_eq!(next_watermark(Some(ts(100)), &[]), None);
        assert_eq!(next_watermark(None, &[]), None);
    }

    #[test]
    fn watermark_never_decreases() {
        assert_eq!(next_watermark(Some(ts(100)), &[ts(50), ts(90)]), None);
        assert_eq!(next_watermark(Some(ts(100)), &[ts(100)]), None);
        assert_eq!(
            next_watermark(Some(ts(100)), &[ts(50), ts(150)]),
            Some(ts(150))
        );
        assert_eq!(next_watermark(None, &[ts(10), ts(20)]), Some(ts(20)));
    }

    #[test]
    fn merge_urls_unions_and_rejoins() {
        let mut r = NewsRecord {
            company: "Empresa Y".into(),
            title: "t".into(),
            topic: Topic::MassHiring,
            published_at: ts(0),
            locale: Locale::Domestic,
            region: "Madrid".into(),
            urls: "https://a.example/one".into(),
            details: "d".into(),
        };
        r.merge_urls("https://b.example/two");
        assert!(r.urls.contains("https://a.example/one"));
        assert!(r.urls.contains("https://b.example/two"));
        assert_eq!(r.urls.matches(URL_SEPARATOR).count(), 1);

        // merging an already-present URL is idempotent
        r.merge_urls("https://a.example/one");
        assert_eq!(r.urls.matches(URL_SEPARATOR).count(), 1);
    }
}
