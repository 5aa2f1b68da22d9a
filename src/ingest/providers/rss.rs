// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::ingest::normalize_text;
use crate::ingest::types::{CandidateItem, SourceProvider};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// Feed dates come as RFC 2822 with arbitrary offsets; everything is
/// normalized to UTC before it enters the pipeline.
fn parse_rfc2822_utc(ts: &str) -> Option<DateTime<Utc>> {
    let dt = OffsetDateTime::parse(ts, &Rfc2822).ok()?;
    let unix = dt.to_offset(UtcOffset::UTC).unix_timestamp();
    DateTime::from_timestamp(unix, 0)
}

/// Generic RSS-feed source. One instance per configured feed URL.
pub struct RssProvider {
    name: String,
    mode: Mode,
}

enum Mode {
    // Owns a copy of the document so tests don't need 'static fixtures.
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssProvider {
    pub fn from_fixture_str(name: impl Into<String>, s: &str) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("company-news-radar/0.1")
            .connect_timeout(std::time::Duration::from_secs(4))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            name: name.into(),
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<CandidateItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            let summary = normalize_text(it.description.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let Some(url) = it.link.filter(|l| !l.trim().is_empty()) else {
                continue;
            };
            // Unparseable dates skip the single entry, not the source.
            let published_at = match it.pub_date.as_deref().and_then(parse_rfc2822_utc) {
                Some(ts) => ts,
                None => {
                    tracing::warn!(
                        provider = %self.name,
                        title = %title,
                        raw_date = ?it.pub_date,
                        "skipping entry with unparseable pubDate"
                    );
                    counter!("ingest_date_parse_failures_total").increment(1);
                    continue;
                }
            };

            out.push(CandidateItem {
                title,
                summary,
                published_at,
                url,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_items_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = match client.get(url).send().await {
                    Ok(resp) => resp.text().await.context("rss http .text()")?,
                    Err(e) => {
                        tracing::warn!(error = ?e, provider = %self.name, "provider http error");
                        return Err(e).context("rss http get()");
                    }
                };
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc2822_offsets_normalize_to_utc() {
        let a = parse_rfc2822_utc("Mon, 17 Mar 2025 21:30:00 +0100").unwrap();
        let b = parse_rfc2822_utc("Mon, 17 Mar 2025 20:30:00 GMT").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bad_date_is_none() {
        assert!(parse_rfc2822_utc("not a date").is_none());
        assert!(parse_rfc2822_utc("").is_none());
    }
}
