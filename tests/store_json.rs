// tests/store_json.rs
use chrono::{TimeZone, Utc};
use company_news_radar::classify::{Locale, Topic};
use company_news_radar::store::json_file::JsonFileStore;
use company_news_radar::store::{CompanyRecord, NewsRecord, RadarStore};

fn record(title: &str) -> NewsRecord {
    NewsRecord {
        company: "Empresa X".into(),
        title: title.into(),
        topic: Topic::Relocation,
        published_at: Utc.timestamp_opt(1_742_244_600, 0).unwrap(),
        locale: Locale::Domestic,
        region: "Valencia".into(),
        urls: "https://example.test/a".into(),
        details: "d".into(),
    }
}

#[tokio::test]
async fn news_round_trips_across_store_instances() {
    let tmp = tempfile::tempdir().unwrap();

    {
        let store = JsonFileStore::new(tmp.path()).unwrap();
        store.insert_news(&record("uno")).await.unwrap();
        store.insert_news(&record("dos")).await.unwrap();
    }

    // a fresh instance over the same dir sees the same documents
    let store = JsonFileStore::new(tmp.path()).unwrap();
    let recent = store.recent_news(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].title, "uno");

    let last = store.recent_news(1).await.unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].title, "dos");
}

#[tokio::test]
async fn company_lookup_or_create_is_by_name() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(tmp.path()).unwrap();

    assert!(store.find_company("Empresa X").await.unwrap().is_none());
    store
        .insert_company(&CompanyRecord {
            name: "Empresa X".into(),
            sector: "cocinas".into(),
            details: "unknown".into(),
        })
        .await
        .unwrap();

    let found = store.find_company("Empresa X").await.unwrap().unwrap();
    assert_eq!(found.sector, "cocinas");
    assert!(store.find_company("Empresa Y").await.unwrap().is_none());
}

#[tokio::test]
async fn watermark_persists_and_never_regresses() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(tmp.path()).unwrap();

    assert!(store.last_run().await.unwrap().is_none());

    let t1 = Utc.timestamp_opt(1_000, 0).unwrap();
    let t2 = Utc.timestamp_opt(2_000, 0).unwrap();

    store.advance_last_run(&[t1, t2]).await.unwrap();
    assert_eq!(store.last_run().await.unwrap(), Some(t2));

    // all candidates at or below the current value: no change
    store.advance_last_run(&[t1]).await.unwrap();
    assert_eq!(store.last_run().await.unwrap(), Some(t2));

    // empty candidate list: explicit no-op
    store.advance_last_run(&[]).await.unwrap();
    assert_eq!(store.last_run().await.unwrap(), Some(t2));

    // fresh instance reads the persisted value
    let store2 = JsonFileStore::new(tmp.path()).unwrap();
    assert_eq!(store2.last_run().await.unwrap(), Some(t2));
}
