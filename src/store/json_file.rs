// src/store/json_file.rs
// File-backed document store: one JSON file per collection, atomic
// tmp-then-rename writes. Volumes are tens of records per run, so each
// operation reads and rewrites the whole collection.
//
// Check-then-insert on companies is not atomic against a second process;
// the scheduler keeps a single pipeline task per process.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{next_watermark, CompanyRecord, NewsRecord, RadarStore};

const NEWS_FILE: &str = "news.json";
const COMPANIES_FILE: &str = "companies.json";
const METADATA_FILE: &str = "app_metadata.json";

/// Singleton watermark document, keyed by a fixed identifier.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AppMetadata {
    ingest: Option<WatermarkDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WatermarkDoc {
    timestamp: DateTime<Utc>,
}

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating store dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn read_collection<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T> {
        let path = self.path(file);
        if !path.exists() {
            return Ok(T::default());
        }
        let s = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))
    }

    fn write_collection<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.path(file);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(value).context("serializing collection")?;
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes())
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl RadarStore for JsonFileStore {
    async fn insert_news(&self, record: &NewsRecord) -> Result<()> {
        let mut all: Vec<NewsRecord> = self.read_collection(NEWS_FILE)?;
        all.push(record.clone());
        self.write_collection(NEWS_FILE, &all)
    }

    async fn recent_news(&self, limit: usize) -> Result<Vec<NewsRecord>> {
        let all: Vec<NewsRecord> = self.read_collection(NEWS_FILE)?;
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }

    async fn find_company(&self, name: &str) -> Result<Option<CompanyRecord>> {
        let all: Vec<CompanyRecord> = self.read_collection(COMPANIES_FILE)?;
        Ok(all.into_iter().find(|c| c.name == name))
    }

    async fn insert_company(&self, company: &CompanyRecord) -> Result<()> {
        let mut all: Vec<CompanyRecord> = self.read_collection(COMPANIES_FILE)?;
        all.push(company.clone());
        self.write_collection(COMPANIES_FILE, &all)
    }

    async fn last_run(&self) -> Result<Option<DateTime<Utc>>> {
        let meta: AppMetadata = self.read_collection(METADATA_FILE)?;
        Ok(meta.ingest.map(|w| w.timestamp))
    }

    async fn advance_last_run(&self, candidates: &[DateTime<Utc>]) -> Result<()> {
        let mut meta: AppMetadata = self.read_collection(METADATA_FILE)?;
        let current = meta.ingest.as_ref().map(|w| w.timestamp);
        if let Some(next) = next_watermark(current, candidates) {
            meta.ingest = Some(WatermarkDoc { timestamp: next });
            self.write_collection(METADATA_FILE, &meta)?;
        }
        Ok(())
    }
}
