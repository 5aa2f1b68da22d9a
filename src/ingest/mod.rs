// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{info, warn};

use crate::classify::{Classifier, UNKNOWN};
use crate::dedup::{dedupe, DuplicateJudge};
use crate::ingest::types::{CandidateItem, SourceProvider};
use crate::scrape::ConfirmationStep;
use crate::store::{CompanyRecord, NewsRecord, RadarStore};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Candidates parsed from providers.");
        describe_counter!(
            "ingest_skipped_watermark_total",
            "Candidates at or before the last-run watermark."
        );
        describe_counter!(
            "ingest_date_parse_failures_total",
            "Entries skipped for unparseable dates."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Whole-source fetch/parse errors."
        );
        describe_counter!("classify_calls_total", "First-pass classification calls.");
        describe_counter!(
            "classify_drop_total",
            "Candidates dropped on unparseable classification replies."
        );
        describe_counter!("scrape_failures_total", "Confirmatory scrape failures.");
        describe_counter!("dedup_merged_total", "Records merged away by dedup.");
        describe_counter!(
            "dedup_judge_failures_total",
            "Duplicate judgments that failed open."
        );
        describe_counter!("persist_errors_total", "Store writes that failed.");
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
        describe_histogram!("classify_ms", "Classification call time in milliseconds.");
        describe_histogram!("scrape_ms", "Confirmatory pass time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the ingest pipeline last ran."
        );
    });
}

/// Normalize source text: entity-decode, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 4) Length cap: 1500 chars (upstream snippets are already short)
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Per-run counters, logged at completion and returned to callers.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunReport {
    pub fetched: usize,
    pub skipped_watermark: usize,
    pub dropped_parse: usize,
    pub dropped_none: usize,
    pub dropped_scrape: usize,
    pub accepted: usize,
    pub merged: usize,
    pub persisted: usize,
    pub companies_created: usize,
    pub persist_errors: usize,
}

/// Final output of one run: the deduplicated records (for the digest
/// collaborator) plus the report.
#[derive(Debug)]
pub struct RunOutcome {
    pub records: Vec<NewsRecord>,
    pub report: RunReport,
}

/// Sequential per-run state machine: Reading -> Classifying -> Scraping ->
/// Deduplicating -> Persisting -> WatermarkUpdate. Per-item failures are
/// recorded and skipped; only the in-run accumulator is mutable state, and
/// this orchestrator owns it exclusively.
pub struct Pipeline {
    providers: Vec<Box<dyn SourceProvider>>,
    classifier: Classifier,
    confirmer: Box<dyn ConfirmationStep>,
    judge: Box<dyn DuplicateJudge>,
    store: Arc<dyn RadarStore>,
}

impl Pipeline {
    pub fn new(
        providers: Vec<Box<dyn SourceProvider>>,
        classifier: Classifier,
        confirmer: Box<dyn ConfirmationStep>,
        judge: Box<dyn DuplicateJudge>,
        store: Arc<dyn RadarStore>,
    ) -> Self {
        Self {
            providers,
            classifier,
            confirmer,
            judge,
            store,
        }
    }

    pub async fn run_once(&self) -> RunOutcome {
        ensure_metrics_described();
        let mut report = RunReport::default();

        // Watermark read failure degrades to a full re-scan, not an abort.
        let watermark = match self.store.last_run().await {
            Ok(w) => w,
            Err(e) => {
                warn!(error = ?e, "watermark read failed, processing all candidates");
                None
            }
        };

        // Reading
        let mut candidates: Vec<CandidateItem> = Vec::new();
        for p in &self.providers {
            match p.fetch_latest().await {
                Ok(mut v) => candidates.append(&mut v),
                Err(e) => {
                    warn!(error = ?e, provider = p.name(), "source unavailable, skipping");
                    counter!("ingest_provider_errors_total").increment(1);
                }
            }
        }
        report.fetched = candidates.len();

        // Classifying + Scraping, one item at a time. The sector observed for
        // each company rides in a side map until the company upsert.
        let mut accumulator: Vec<NewsRecord> = Vec::new();
        let mut sectors: HashMap<String, String> = HashMap::new();
        for item in candidates {
            if let Some(w) = watermark {
                if item.published_at <= w {
                    report.skipped_watermark += 1;
                    counter!("ingest_skipped_watermark_total").increment(1);
                    continue;
                }
            }

            let provisional = match self.classifier.classify(&item.title, &item.summary).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(title = %item.title, url = %item.url, error = ?e, "classification failed, dropping");
                    counter!("classify_drop_total").increment(1);
                    report.dropped_parse += 1;
                    continue;
                }
            };
            if provisional.topic.is_none() {
                report.dropped_none += 1;
                continue;
            }

            // The confirmatory verdict wins wholesale, company name included.
            let confirmed = self.confirmer.confirm(&item, &provisional).await;
            if confirmed.topic.is_none() {
                report.dropped_scrape += 1;
                continue;
            }

            for name in split_company_names(&confirmed.company) {
                sectors
                    .entry(name)
                    .or_insert_with(|| confirmed.sector.clone());
            }
            accumulator.push(NewsRecord {
                company: confirmed.company,
                title: item.title,
                topic: confirmed.topic,
                published_at: item.published_at,
                locale: confirmed.locale,
                region: confirmed.region,
                urls: item.url,
                details: confirmed.details,
            });
        }

        // Deduplicating. Watermark candidates are taken before the merge: a
        // record folded into a survivor was still ingested.
        let accepted_ts: Vec<DateTime<Utc>> =
            accumulator.iter().map(|r| r.published_at).collect();
        let before = accumulator.len();
        let records = dedupe(accumulator, self.judge.as_ref()).await;
        report.merged = before - records.len();
        report.accepted = records.len();

        // Persisting: companies first, then news. Write failures are logged
        // and counted, never fatal to the run.
        for record in &records {
            for name in split_company_names(&record.company) {
                match self.ensure_company(&name, &sectors).await {
                    Ok(created) => {
                        if created {
                            report.companies_created += 1;
                        }
                    }
                    Err(e) => {
                        warn!(company = %name, error = ?e, "company upsert failed");
                        counter!("persist_errors_total").increment(1);
                        report.persist_errors += 1;
                    }
                }
            }
            match self.store.insert_news(record).await {
                Ok(()) => report.persisted += 1,
                Err(e) => {
                    warn!(title = %record.title, error = ?e, "news insert failed");
                    counter!("persist_errors_total").increment(1);
                    report.persist_errors += 1;
                }
            }
        }

        // WatermarkUpdate: only runs with accepted items advance it.
        if let Err(e) = self.store.advance_last_run(&accepted_ts).await {
            warn!(error = ?e, "watermark update failed");
            counter!("persist_errors_total").increment(1);
            report.persist_errors += 1;
        }

        gauge!("ingest_pipeline_last_run_ts").set(Utc::now().timestamp().max(0) as f64);
        info!(
            fetched = report.fetched,
            skipped_watermark = report.skipped_watermark,
            dropped_parse = report.dropped_parse,
            dropped_none = report.dropped_none,
            dropped_scrape = report.dropped_scrape,
            accepted = report.accepted,
            merged = report.merged,
            persisted = report.persisted,
            companies_created = report.companies_created,
            "ingest run complete"
        );

        RunOutcome { records, report }
    }

    /// Lookup-or-create one company row. Returns true when a row was created.
    /// Not atomic against a concurrent writer; the scheduler runs a single
    /// pipeline task per process.
    async fn ensure_company(
        &self,
        name: &str,
        sectors: &HashMap<String, String>,
    ) -> anyhow::Result<bool> {
        if self.store.find_company(name).await?.is_some() {
            return Ok(false);
        }
        let sector = sectors
            .get(name)
            .cloned()
            .unwrap_or_else(|| UNKNOWN.to_string());
        self.store
            .insert_company(&CompanyRecord {
                name: name.to_string(),
                sector,
                details: UNKNOWN.to_string(),
            })
            .await?;
        Ok(true)
    }
}

/// Company field may comma-join several names; "unknown" never yields a row.
pub fn split_company_names(company: &str) -> Vec<String> {
    company
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(UNKNOWN))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let s = "  <b>Empresa&nbsp;X</b> crece   r&aacute;pido ";
        assert_eq!(normalize_text(s), "Empresa X crece r\u{e1}pido");
    }

    #[test]
    fn company_splitting_drops_unknown() {
        assert_eq!(
            split_company_names("Alpha SL, Beta SA"),
            vec!["Alpha SL".to_string(), "Beta SA".to_string()]
        );
        assert!(split_company_names("unknown").is_empty());
        assert!(split_company_names("Unknown").is_empty());
        assert_eq!(split_company_names("Gamma"), vec!["Gamma".to_string()]);
        assert!(split_company_names("").is_empty());
    }
}
