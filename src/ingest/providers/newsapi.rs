// src/ingest/providers/newsapi.rs
// Search-API source: one GET per configured query against a newsapi-style
// `/v2/everything` endpoint. Pagination is assumed fully returned by the
// provider for the configured page size.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;

use crate::ingest::normalize_text;
use crate::ingest::types::{CandidateItem, SourceProvider};

const DEFAULT_ENDPOINT: &str = "https://newsapi.org/v2/everything";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    articles: Vec<Article>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

pub struct NewsApiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    query: String,
}

impl NewsApiProvider {
    pub fn new(api_key: impl Into<String>, query: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, query, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(
        api_key: impl Into<String>,
        query: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("company-news-radar/0.1")
            .connect_timeout(std::time::Duration::from_secs(4))
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            query: query.into(),
        }
    }

    /// Parsing is separated from the fetch so tests can feed captured bodies.
    pub fn parse_body(body: &str) -> Result<Vec<CandidateItem>> {
        let resp: SearchResponse = serde_json::from_str(body).context("parsing search response")?;
        if resp.status != "ok" {
            return Err(anyhow!(
                "search api status {:?}: {}",
                resp.status,
                resp.message.unwrap_or_default()
            ));
        }

        let mut out = Vec::with_capacity(resp.articles.len());
        for a in resp.articles {
            let title = normalize_text(a.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let Some(url) = a.url.filter(|u| !u.trim().is_empty()) else {
                continue;
            };
            // publishedAt is ISO-8601, Z-suffixed.
            let published_at = match a
                .published_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
            {
                Some(ts) => ts,
                None => {
                    tracing::warn!(title = %title, raw_date = ?a.published_at, "skipping article with unparseable publishedAt");
                    counter!("ingest_date_parse_failures_total").increment(1);
                    continue;
                }
            };

            out.push(CandidateItem {
                title,
                summary: normalize_text(a.description.as_deref().unwrap_or_default()),
                published_at,
                url,
            });
        }
        counter!("ingest_items_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for NewsApiProvider {
    async fn fetch_latest(&self) -> Result<Vec<CandidateItem>> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", self.query.as_str()), ("apiKey", self.api_key.as_str())])
            .send()
            .await
            .context("search api get()")?;
        let body = resp.text().await.context("search api .text()")?;
        Self::parse_body(&body)
    }

    fn name(&self) -> &str {
        "NewsSearch"
    }
}
