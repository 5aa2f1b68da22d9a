// src/classify/mod.rs
// First-pass classification of a candidate item from title + summary only.

pub mod backend;
pub mod extract;

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::backend::ChatBackend;
use crate::classify::extract::extract_verdict;

/// Bump when the instruction template changes in a way that shifts verdicts.
pub const PROMPT_VERSION: &str = "v2";

/// One of the three recognized business events, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    NewCompany,
    MassHiring,
    Relocation,
    None,
}

impl Topic {
    pub fn label(&self) -> &'static str {
        match self {
            Topic::NewCompany => "new_company",
            Topic::MassHiring => "mass_hiring",
            Topic::Relocation => "relocation",
            Topic::None => "none",
        }
    }

    pub fn from_label(s: &str) -> Topic {
        match s.trim().to_ascii_lowercase().as_str() {
            "new_company" => Topic::NewCompany,
            "mass_hiring" => Topic::MassHiring,
            "relocation" => Topic::Relocation,
            _ => Topic::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Topic::None)
    }
}

/// Coarse domestic/international flag. Gates the finer `region` field:
/// an Unknown locale forces region back to "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Domestic,
    International,
    Unknown,
}

impl Locale {
    pub fn from_label(s: &str) -> Locale {
        match s.trim().to_ascii_lowercase().as_str() {
            "domestic" => Locale::Domestic,
            "international" => Locale::International,
            _ => Locale::Unknown,
        }
    }
}

pub const UNKNOWN: &str = "unknown";

/// Structured output of one classification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub topic: Topic,
    /// Company name, or comma-joined names, or "unknown".
    pub company: String,
    pub sector: String,
    pub locale: Locale,
    pub region: String,
    /// Short summary of the relevant facts.
    pub details: String,
    /// Diagnostic only, never persisted.
    pub rationale: String,
}

impl ClassificationVerdict {
    /// Terminal verdict used when a step fails or yields nothing usable.
    pub fn none(details: impl Into<String>) -> Self {
        Self {
            topic: Topic::None,
            company: UNKNOWN.to_string(),
            sector: UNKNOWN.to_string(),
            locale: Locale::Unknown,
            region: UNKNOWN.to_string(),
            details: details.into(),
            rationale: String::new(),
        }
    }
}

const CLASSIFY_SYSTEM: &str = "\
You are an analyst of business news. Decide whether an article ACTIVELY describes \
one of exactly three events: the founding of a new company (\"new_company\"), \
large-scale hiring by a company (\"mass_hiring\"), or a company moving its \
headquarters (\"relocation\"). If the article does not actively describe one of \
these three events, the topic is \"none\". Articles about funding rounds, revenue \
or profit are NEVER assigned a topic, no matter how large the sums mentioned. \
Respond with a single JSON object and nothing else, in this exact shape: \
{\"topic\": \"new_company|mass_hiring|relocation|none\", \
\"company\": \"company name, comma-separated if several, or unknown\", \
\"sector\": \"business sector or unknown\", \
\"locale\": \"domestic|international|unknown\", \
\"region\": \"city or region, or unknown\", \
\"details\": \"one short sentence with the relevant facts\", \
\"rationale\": \"one short sentence explaining the decision\"}";

/// First-pass classifier. One blocking model round trip per candidate,
/// no retry: a malformed response drops the item.
pub struct Classifier {
    backend: Arc<dyn ChatBackend>,
}

impl Classifier {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub async fn classify(&self, title: &str, summary: &str) -> Result<ClassificationVerdict> {
        let user = format!("Titular: {title}  Descripci\u{f3}n: {summary}");

        let t0 = std::time::Instant::now();
        let raw = self
            .backend
            .complete(CLASSIFY_SYSTEM, &user)
            .await
            .context("classification backend call")?;
        histogram!("classify_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let verdict = extract_verdict(&raw).context("extracting classification verdict")?;
        debug!(topic = verdict.topic.label(), company = %verdict.company, "classified");
        counter!("classify_calls_total").increment(1);
        Ok(verdict)
    }
}
