// src/notify/mod.rs
// Downstream digest collaborator: matches the run's final records against
// per-user subscriptions and assembles one bulletin per user. Delivery
// itself lives in `email`.

pub mod email;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::store::NewsRecord;

const ENV_PATH: &str = "RADAR_SUBSCRIBERS_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub email: String,
    /// Topic labels ("new_company", ...) and/or exact company names.
    #[serde(default)]
    pub subscriptions: Vec<String>,
    /// Region filter; empty means any region.
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Digest {
    pub recipient: String,
    pub items: Vec<NewsRecord>,
}

fn record_matches(record: &NewsRecord, sub: &Subscriber) -> bool {
    let topic_or_company = sub
        .subscriptions
        .iter()
        .any(|s| s.as_str() == record.topic.label() || *s == record.company);
    if !topic_or_company {
        return false;
    }
    sub.locations.is_empty() || sub.locations.iter().any(|l| *l == record.region)
}

/// One digest per subscriber with at least one matching record. Exact string
/// membership on both axes; no fuzzy matching.
pub fn build_digests(records: &[NewsRecord], subscribers: &[Subscriber]) -> Vec<Digest> {
    let mut out = Vec::new();
    for sub in subscribers {
        let items: Vec<NewsRecord> = records
            .iter()
            .filter(|r| record_matches(r, sub))
            .cloned()
            .collect();
        if !items.is_empty() {
            out.push(Digest {
                recipient: sub.email.clone(),
                items,
            });
        }
    }
    out
}

/// Load subscribers from an explicit path. Supports TOML or JSON formats.
pub fn load_subscribers_from(path: &Path) -> Result<Vec<Subscriber>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading subscribers from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_subscribers(&content, ext.as_str())
}

/// Load subscribers using env var + fallbacks:
/// 1) $RADAR_SUBSCRIBERS_PATH
/// 2) config/subscribers.toml
/// 3) config/subscribers.json
pub fn load_subscribers_default() -> Result<Vec<Subscriber>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_subscribers_from(&pb);
        } else {
            return Err(anyhow!("RADAR_SUBSCRIBERS_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/subscribers.toml");
    if toml_p.exists() {
        return load_subscribers_from(&toml_p);
    }
    let json_p = PathBuf::from("config/subscribers.json");
    if json_p.exists() {
        return load_subscribers_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_subscribers(s: &str, hint_ext: &str) -> Result<Vec<Subscriber>> {
    #[derive(Deserialize)]
    struct TomlFile {
        subscribers: Vec<Subscriber>,
    }
    if hint_ext == "toml" || s.contains("[[subscribers]]") {
        if let Ok(v) = toml::from_str::<TomlFile>(s) {
            return Ok(v.subscribers);
        }
    }
    if let Ok(v) = serde_json::from_str::<Vec<Subscriber>>(s) {
        return Ok(v);
    }
    Err(anyhow!("unsupported subscribers format"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Locale, Topic};
    use chrono::{TimeZone, Utc};

    fn record(topic: Topic, company: &str, region: &str) -> NewsRecord {
        NewsRecord {
            company: company.to_string(),
            title: format!("{company} news"),
            topic,
            published_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            locale: Locale::Domestic,
            region: region.to_string(),
            urls: "https://example.test/a".to_string(),
            details: "d".to_string(),
        }
    }

    #[test]
    fn digest_matches_topic_subscription() {
        let records = vec![
            record(Topic::Relocation, "Empresa X", "Valencia"),
            record(Topic::NewCompany, "Alpha SL", "Madrid"),
        ];
        let subs = vec![Subscriber {
            email: "a@example.test".into(),
            subscriptions: vec!["relocation".into()],
            locations: vec![],
        }];
        let digests = build_digests(&records, &subs);
        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].items.len(), 1);
        assert_eq!(digests[0].items[0].company, "Empresa X");
    }

    #[test]
    fn digest_matches_company_subscription() {
        let records = vec![record(Topic::MassHiring, "Empresa Y", "Madrid")];
        let subs = vec![Subscriber {
            email: "b@example.test".into(),
            subscriptions: vec!["Empresa Y".into()],
            locations: vec![],
        }];
        assert_eq!(build_digests(&records, &subs).len(), 1);
    }

    #[test]
    fn location_filter_is_exact_membership() {
        let records = vec![record(Topic::Relocation, "Empresa X", "Valencia")];
        let mut sub = Subscriber {
            email: "c@example.test".into(),
            subscriptions: vec!["relocation".into()],
            locations: vec!["Madrid".into()],
        };
        assert!(build_digests(&records, &[sub.clone()]).is_empty());
        sub.locations = vec!["Valencia".into()];
        assert_eq!(build_digests(&records, &[sub]).len(), 1);
    }

    #[test]
    fn no_matches_means_no_digest() {
        let records = vec![record(Topic::NewCompany, "Alpha SL", "Madrid")];
        let subs = vec![Subscriber {
            email: "d@example.test".into(),
            subscriptions: vec!["mass_hiring".into()],
            locations: vec![],
        }];
        assert!(build_digests(&records, &subs).is_empty());
    }

    #[test]
    fn toml_and_json_formats_parse() {
        let toml_src = r#"
[[subscribers]]
email = "x@example.test"
subscriptions = ["relocation"]
locations = ["Valencia"]
"#;
        let v = parse_subscribers(toml_src, "toml").unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].email, "x@example.test");

        let json_src = r#"[{"email":"y@example.test","subscriptions":["new_company"]}]"#;
        let v = parse_subscribers(json_src, "json").unwrap();
        assert_eq!(v[0].subscriptions, vec!["new_company".to_string()]);
        assert!(v[0].locations.is_empty());
    }
}
