//! Demo that assembles digests from a few canned records (stdout only, no SMTP).

use chrono::Utc;
use company_news_radar::notify::email::render_digest_html;
use company_news_radar::{build_digests, Locale, NewsRecord, Subscriber, Topic};

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let records = vec![
        NewsRecord {
            company: "Empresa X".into(),
            title: "Empresa X traslada su sede a Valencia".into(),
            topic: Topic::Relocation,
            published_at: Utc::now(),
            locale: Locale::Domestic,
            region: "Valencia".into(),
            urls: "https://example.test/sede".into(),
            details: "Nueva sede central en Valencia".into(),
        },
        NewsRecord {
            company: "Empresa Y".into(),
            title: "Empresa Y contratar\u{e1} 300 empleados".into(),
            topic: Topic::MassHiring,
            published_at: Utc::now(),
            locale: Locale::Domestic,
            region: "Madrid".into(),
            urls: "https://example.test/contratacion | https://other.test/hiring".into(),
            details: "300 nuevos puestos este a\u{f1}o".into(),
        },
    ];

    let subscribers = vec![
        Subscriber {
            email: "relocations@example.test".into(),
            subscriptions: vec!["relocation".into()],
            locations: vec![],
        },
        Subscriber {
            email: "valencia-only@example.test".into(),
            subscriptions: vec!["relocation".into(), "mass_hiring".into()],
            locations: vec!["Valencia".into()],
        },
    ];

    for digest in build_digests(&records, &subscribers) {
        println!("--- digest for {} ---", digest.recipient);
        println!("{}", render_digest_html(&digest));
    }

    println!("digest-demo done");
}
