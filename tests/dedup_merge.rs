// tests/dedup_merge.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use company_news_radar::classify::{Locale, Topic};
use company_news_radar::dedup::{dedupe, DuplicateJudge, DuplicateVerdict};
use company_news_radar::store::{NewsRecord, URL_SEPARATOR};

fn record(title: &str, url: &str) -> NewsRecord {
    NewsRecord {
        company: "Empresa Y".into(),
        title: title.into(),
        topic: Topic::MassHiring,
        published_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        locale: Locale::Domestic,
        region: "Madrid".into(),
        urls: url.into(),
        details: "contrata 300 empleados".into(),
    }
}

/// Judges duplicates by exact details equality; optionally errors on every call.
struct StubJudge {
    fail: bool,
}

#[async_trait]
impl DuplicateJudge for StubJudge {
    async fn is_duplicate(&self, a: &NewsRecord, b: &NewsRecord) -> Result<DuplicateVerdict> {
        if self.fail {
            return Err(anyhow!("judge exploded"));
        }
        Ok(DuplicateVerdict {
            duplicate: a.details == b.details,
            rationale: "same details".into(),
        })
    }
}

#[tokio::test]
async fn same_event_from_two_outlets_merges_urls() {
    let items = vec![
        record("Empresa Y contrata 300", "https://a.example/one"),
        record("300 empleos nuevos en Empresa Y", "https://b.example/two"),
    ];
    let out = dedupe(items, &StubJudge { fail: false }).await;

    assert_eq!(out.len(), 1);
    assert!(out[0].urls.contains("https://a.example/one"));
    assert!(out[0].urls.contains("https://b.example/two"));
    assert_eq!(out[0].urls.matches(URL_SEPARATOR).count(), 1);
    // survivor keeps the first item's title
    assert_eq!(out[0].title, "Empresa Y contrata 300");
}

#[tokio::test]
async fn distinct_events_survive() {
    let mut a = record("Empresa Y contrata 300", "https://a.example/one");
    let mut b = record("Empresa Z abre oficina", "https://b.example/two");
    a.details = "contrata 300".into();
    b.details = "abre oficina".into();

    let out = dedupe(vec![a, b], &StubJudge { fail: false }).await;
    assert_eq!(out.len(), 2);
}

#[tokio::test]
async fn judge_failure_fails_open() {
    let items = vec![
        record("Empresa Y contrata 300", "https://a.example/one"),
        record("300 empleos nuevos en Empresa Y", "https://b.example/two"),
    ];
    let out = dedupe(items, &StubJudge { fail: true }).await;
    // comparator errors must never collapse distinct records
    assert_eq!(out.len(), 2);
}

#[tokio::test]
async fn three_way_duplicates_fold_into_first_survivor() {
    let items = vec![
        record("v1", "https://a.example/one"),
        record("v2", "https://b.example/two"),
        record("v3", "https://c.example/three"),
    ];
    let out = dedupe(items, &StubJudge { fail: false }).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].urls.matches(URL_SEPARATOR).count(), 2);
}
