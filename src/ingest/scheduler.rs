// src/ingest/scheduler.rs
use std::sync::Arc;

use metrics::counter;
use tokio::task::JoinHandle;

use crate::ingest::Pipeline;
use crate::notify::email::DigestMailer;
use crate::notify::{build_digests, Subscriber};

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    pub interval_secs: u64,
}

/// Spawn the periodic ingest task: one pipeline run per tick, followed by
/// digest delivery for the run's accepted records. A single task per process
/// keeps the store's check-then-insert race out of play.
pub fn spawn_scheduler(
    pipeline: Arc<Pipeline>,
    mailer: Option<Arc<DigestMailer>>,
    subscribers: Vec<Subscriber>,
    cfg: IngestSchedulerCfg,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(cfg.interval_secs));
        loop {
            ticker.tick().await;

            let outcome = pipeline.run_once().await;
            counter!("ingest_runs_total").increment(1);

            if outcome.records.is_empty() {
                continue;
            }
            let Some(mailer) = mailer.as_ref() else {
                continue;
            };
            for digest in build_digests(&outcome.records, &subscribers) {
                if let Err(e) = mailer.send_digest(&digest).await {
                    tracing::warn!(recipient = %digest.recipient, error = ?e, "digest send failed");
                } else {
                    tracing::info!(
                        recipient = %digest.recipient,
                        items = digest.items.len(),
                        "digest sent"
                    );
                }
            }
        }
    })
}
