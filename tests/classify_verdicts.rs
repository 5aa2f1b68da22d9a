// tests/classify_verdicts.rs
use std::sync::Arc;

use company_news_radar::classify::backend::MockBackend;
use company_news_radar::classify::{Classifier, Locale, Topic};

#[tokio::test]
async fn canned_relocation_reply_yields_typed_verdict() {
    let backend = Arc::new(MockBackend::fixed(
        r#"{"topic":"relocation","company":"Empresa X","sector":"cocinas","locale":"domestic","region":"Valencia","details":"Traslada su sede a Valencia","rationale":"describes an HQ move"}"#,
    ));
    let classifier = Classifier::new(backend);

    let v = classifier
        .classify(
            "Empresa X traslada su sede a Valencia",
            "La compa\u{f1}\u{ed}a confirma el traslado",
        )
        .await
        .unwrap();

    assert_eq!(v.topic, Topic::Relocation);
    assert_eq!(v.company, "Empresa X");
    assert_eq!(v.locale, Locale::Domestic);
    assert_eq!(v.region, "Valencia");
}

#[tokio::test]
async fn reply_without_json_is_an_error() {
    let backend = Arc::new(MockBackend::fixed("I could not decide, sorry."));
    let classifier = Classifier::new(backend);
    assert!(classifier.classify("t", "s").await.is_err());
}

#[tokio::test]
async fn unknown_locale_clamps_region() {
    let backend = Arc::new(MockBackend::fixed(
        r#"{"topic":"new_company","company":"Alpha SL","locale":"unknown","region":"Madrid"}"#,
    ));
    let classifier = Classifier::new(backend);
    let v = classifier.classify("t", "s").await.unwrap();
    assert_eq!(v.locale, Locale::Unknown);
    assert_eq!(v.region, "unknown");
}

#[tokio::test]
async fn mock_queue_serves_replies_in_order() {
    let backend = Arc::new(MockBackend::new(vec![
        r#"{"topic":"mass_hiring","company":"A"}"#,
        r#"{"topic":"none"}"#,
    ]));
    let classifier = Classifier::new(backend);

    let first = classifier.classify("t1", "s1").await.unwrap();
    let second = classifier.classify("t2", "s2").await.unwrap();
    assert_eq!(first.topic, Topic::MassHiring);
    assert!(second.topic.is_none());
}
