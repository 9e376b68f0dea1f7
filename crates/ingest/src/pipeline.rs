use std::time::Duration;

use tokio::sync::mpsc;
use tracelens_core::model::log::LogRecord;
use tracelens_store::Store;
use tracing::warn;

/// Buffers accepted log batches and writes them to the store in bulk.
#[derive(Clone)]
pub struct Pipeline {
    logs_tx: mpsc::Sender<Vec<LogRecord>>,
}

pub struct PipelineConfig {
    pub channel_capacity: usize,
    pub flush_interval: Duration,
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            flush_interval: Duration::from_millis(200),
            batch_size: 2048,
        }
    }
}

impl Pipeline {
    pub fn new(store: Store, cfg: PipelineConfig) -> Self {
        let (logs_tx, logs_rx) = mpsc::channel(cfg.channel_capacity);
        tokio::spawn(run_log_writer(
            store,
            logs_rx,
            cfg.batch_size,
            cfg.flush_interval,
        ));
        Self { logs_tx }
    }

    pub async fn submit_logs(&self, logs: Vec<LogRecord>) {
        if logs.is_empty() {
            return;
        }
        if self.logs_tx.send(logs).await.is_err() {
            warn!("log pipeline dropped batch: receiver closed");
        }
    }
}

async fn run_log_writer(
    store: Store,
    mut rx: mpsc::Receiver<Vec<LogRecord>>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut ticker = tokio::time::interval(flush_interval);
    let mut buffer = Vec::new();
    loop {
        tokio::select! {
            Some(batch) = rx.recv() => {
                buffer.extend(batch);
                if buffer.len() >= batch_size {
                    flush_logs(&store, &mut buffer);
                }
            }
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    flush_logs(&store, &mut buffer);
                }
            }
            else => break,
        }
    }

    if !buffer.is_empty() {
        flush_logs(&store, &mut buffer);
    }
}

fn flush_logs(store: &Store, buffer: &mut Vec<LogRecord>) {
    match store.insert_logs(buffer) {
        Ok(()) => tracing::debug!(count = buffer.len(), "log batch written"),
        Err(e) => warn!(error = ?e, count = buffer.len(), "failed to write log batch"),
    }
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tracelens_core::model::log::Severity;
    use tracelens_core::repo::LogStore;

    use super::*;

    #[tokio::test]
    async fn pipeline_writes_logs() {
        let store = Store::open_in_memory().unwrap();
        let pipeline = Pipeline::new(
            store.clone(),
            PipelineConfig {
                channel_capacity: 8,
                flush_interval: std::time::Duration::from_millis(10),
                batch_size: 4,
            },
        );

        let ts = testkit::base_time();
        pipeline
            .submit_logs(vec![testkit::log(
                "p1",
                "t1",
                testkit::SERVICE,
                ts,
                Severity::Error,
                "checkout failed",
            )])
            .await;

        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        let logs = store.find_by_trace_id("p1", "t1", 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "checkout failed");
        assert_eq!(logs[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn pipeline_flushes_on_batch_size() {
        let store = Store::open_in_memory().unwrap();
        let pipeline = Pipeline::new(
            store.clone(),
            PipelineConfig {
                channel_capacity: 8,
                flush_interval: std::time::Duration::from_secs(5),
                batch_size: 2,
            },
        );

        let base = testkit::base_time();
        for i in 0..2 {
            pipeline
                .submit_logs(vec![testkit::log(
                    "p1",
                    "t1",
                    testkit::SERVICE,
                    base + Duration::seconds(i),
                    Severity::Info,
                    &format!("line{i}"),
                )])
                .await;
        }

        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        let logs = store.find_by_trace_id("p1", "t1", 10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].message, "line1");
    }
}
