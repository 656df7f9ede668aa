//! Report-tick logic: drain the storage into a wire batch and hand it to the
//! active transport.

use std::sync::Arc;

use tracing::{info, warn};

use pulse_core::Metric;

use crate::storage::Storage;
use crate::transport::Transport;

/// Builds and ships one batch per report tick.
pub struct Reporter {
    storage: Arc<Storage>,
    transport: Box<dyn Transport>,
}

impl Reporter {
    pub fn new(storage: Arc<Storage>, transport: Box<dyn Transport>) -> Self {
        Self { storage, transport }
    }

    /// Snapshot all metrics, reset reported counters, transmit.
    ///
    /// Counters are reset by subtracting the reported value, so increments
    /// that land between the snapshot and the reset stay accumulated for the
    /// next tick. A failed transmission leaves counters reduced; delivery is
    /// at-most-once.
    pub async fn report(&self) {
        let mut batch: Vec<Metric> = Vec::with_capacity(
            self.storage.total_gauges() + self.storage.total_counters(),
        );

        for (name, value) in self.storage.gauges() {
            batch.push(Metric::gauge(name, value));
        }

        for (name, value) in self.storage.counters() {
            batch.push(Metric::counter(name.clone(), value));

            // Subtract the sent value to take into account
            // possible counter updates after the snapshot.
            self.storage.update_counter(&name, -value);
        }

        if let Err(e) = self.transport.send(&batch).await {
            warn!(error = %e, "report failed");
            return;
        }

        info!(metrics = batch.len(), "report done");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pulse_core::{PulseError, Result};
    use std::sync::Mutex;

    #[derive(Clone)]
    struct RecordingTransport {
        batches: Arc<Mutex<Vec<Vec<Metric>>>>,
        fail: bool,
    }

    impl RecordingTransport {
        fn new(fail: bool) -> Self {
            Self { batches: Arc::new(Mutex::new(Vec::new())), fail }
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, batch: &[Metric]) -> Result<()> {
            self.batches.lock().unwrap().push(batch.to_vec());
            if self.fail {
                return Err(PulseError::Transport { reason: "boom".to_string() });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn report_resets_counters_and_keeps_gauges() {
        let storage = Arc::new(Storage::new());
        storage.update_gauge("Alloc", 3.5);
        storage.update_counter("PollCount", 5);

        let transport = RecordingTransport::new(false);
        let batches = Arc::clone(&transport.batches);
        let reporter = Reporter::new(Arc::clone(&storage), Box::new(transport));

        reporter.report().await;

        let sent = batches.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains(&Metric::gauge("Alloc", 3.5)));
        assert!(sent[0].contains(&Metric::counter("PollCount", 5)));
        drop(sent);

        // Counter drained, gauge untouched.
        assert_eq!(storage.counters(), vec![("PollCount".to_string(), 0)]);
        assert_eq!(storage.gauges(), vec![("Alloc".to_string(), 3.5)]);
    }

    #[tokio::test]
    async fn failed_report_still_resets_counter() {
        let storage = Arc::new(Storage::new());
        storage.update_counter("PollCount", 7);

        let reporter = Reporter::new(Arc::clone(&storage), Box::new(RecordingTransport::new(true)));

        reporter.report().await;

        // At-most-once delivery: the drained value is not restored.
        assert_eq!(storage.counters(), vec![("PollCount".to_string(), 0)]);
    }

    #[tokio::test]
    async fn increments_after_snapshot_survive_the_reset() {
        let storage = Arc::new(Storage::new());
        storage.update_counter("PollCount", 5);

        // Simulate the reporter's drain with a sampler racing in between.
        let snapshot = storage.counters();
        storage.update_counter("PollCount", 3);
        for (name, value) in snapshot {
            storage.update_counter(&name, -value);
        }

        assert_eq!(storage.counters(), vec![("PollCount".to_string(), 3)]);
    }
}
