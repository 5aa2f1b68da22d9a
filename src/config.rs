// src/config.rs
// One immutable configuration struct, loaded at boot and passed by
// constructor injection. Secrets use the "ENV" indirection so the file can
// live in the repo while keys come from the environment.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

use crate::scrape::MAX_ARTICLE_CHARS;

fn default_interval() -> u64 {
    3600
}
fn default_store_dir() -> String {
    "data".to_string()
}
fn default_max_chars() -> usize {
    MAX_ARTICLE_CHARS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub chat: ChatConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    /// Seconds between scheduled runs; 0 disables the scheduler.
    #[serde(default = "default_interval")]
    pub ingest_interval_secs: u64,
    #[serde(default = "default_store_dir")]
    pub store_dir: String,
    #[serde(default = "default_max_chars")]
    pub scrape_max_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// "openai" (case-insensitive); anything else fails at boot.
    pub provider: String,
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// "ENV" means: read from NEWSAPI_API_KEY.
    pub api_key: String,
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    /// "ENV" means: read from SMTP_PASS.
    pub pass: String,
    pub from: String,
}

fn resolve_env(value: &mut String, var: &str) -> Result<()> {
    if value.trim().eq_ignore_ascii_case("env") {
        *value =
            env::var(var).map_err(|_| anyhow!("config wants {var} from env, but it is unset"))?;
    }
    Ok(())
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.as_ref().display()))?;
        let mut cfg: AppConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing config {}", path.as_ref().display()))?;

        cfg.chat.provider = cfg.chat.provider.to_lowercase();
        if cfg.chat.provider != "openai" {
            anyhow::bail!("unsupported chat provider in config: {}", cfg.chat.provider);
        }
        resolve_env(&mut cfg.chat.api_key, "OPENAI_API_KEY")?;
        if let Some(search) = cfg.search.as_mut() {
            resolve_env(&mut search.api_key, "NEWSAPI_API_KEY")?;
        }
        if let Some(smtp) = cfg.smtp.as_mut() {
            resolve_env(&mut smtp.pass, "SMTP_PASS")?;
        }

        if cfg.scrape_max_chars == 0 {
            cfg.scrape_max_chars = default_max_chars();
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "chat": {"provider": "OpenAI", "model": "gpt-4o-mini", "api_key": "sk-test"},
        "feeds": [{"name": "Emprendedores", "url": "https://feeds.example.test/emprendedores.xml"}]
    }"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("radar.json");
        std::fs::write(&p, MINIMAL).unwrap();

        let cfg = AppConfig::load_from_file(&p).unwrap();
        assert_eq!(cfg.chat.provider, "openai");
        assert_eq!(cfg.ingest_interval_secs, 3600);
        assert_eq!(cfg.store_dir, "data");
        assert_eq!(cfg.scrape_max_chars, MAX_ARTICLE_CHARS);
        assert!(cfg.search.is_none());
        assert!(cfg.smtp.is_none());
    }

    #[serial_test::serial]
    #[test]
    fn env_indirection_resolves_key() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("radar.json");
        std::fs::write(
            &p,
            r#"{"chat": {"provider": "openai", "model": "gpt-4o-mini", "api_key": "ENV"}}"#,
        )
        .unwrap();

        std::env::set_var("OPENAI_API_KEY", "sk-from-env");
        let cfg = AppConfig::load_from_file(&p).unwrap();
        assert_eq!(cfg.chat.api_key, "sk-from-env");
        std::env::remove_var("OPENAI_API_KEY");

        assert!(AppConfig::load_from_file(&p).is_err());
    }
}
