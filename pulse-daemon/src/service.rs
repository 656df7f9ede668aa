//! Thin service layer between the frontends and the storage backends.
//!
//! The service validates parameter shape and nothing else; it exists so the
//! two backends stay substitutable behind one handle.

use std::sync::Arc;

use pulse_core::{Metric, PulseError, Result};

use crate::storage::Repository;

/// Backend-neutral handle shared by the REST and gRPC frontends.
#[derive(Clone)]
pub struct MetricsService {
    repo: Arc<dyn Repository>,
}

impl MetricsService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn update_gauge(&self, name: &str, value: f64) -> Result<()> {
        require_name(name)?;
        self.repo.update_gauge(name, value).await
    }

    pub async fn update_counter(&self, name: &str, delta: i64) -> Result<()> {
        require_name(name)?;
        self.repo.update_counter(name, delta).await
    }

    pub async fn gauge(&self, name: &str) -> Result<f64> {
        self.repo.gauge(name).await
    }

    pub async fn counter(&self, name: &str) -> Result<i64> {
        self.repo.counter(name).await
    }

    /// Apply a batch in order. The batch must be non-empty and every record
    /// must carry the field matching its kind.
    pub async fn updates(&self, metrics: &[Metric]) -> Result<()> {
        if metrics.is_empty() {
            return Err(PulseError::MalformedMetric { reason: "empty batch".to_string() });
        }

        for m in metrics {
            m.validate()?;
        }

        self.repo.updates(metrics).await
    }

    pub async fn gauges(&self) -> Result<Vec<(String, f64)>> {
        self.repo.gauges().await
    }

    pub async fn counters(&self) -> Result<Vec<(String, i64)>> {
        self.repo.counters().await
    }

    pub async fn ping(&self) -> Result<()> {
        self.repo.ping().await
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PulseError::MalformedMetric { reason: "empty metric id".to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, MemoryStorageConfig};
    use std::time::Duration;

    fn service() -> MetricsService {
        let config = MemoryStorageConfig {
            store_interval: Duration::ZERO,
            store_file: None,
            restore: false,
        };
        MetricsService::new(Arc::new(MemoryStorage::new(config).unwrap()))
    }

    #[tokio::test]
    async fn empty_batch_is_malformed() {
        let err = service().updates(&[]).await.unwrap_err();
        assert!(matches!(err, PulseError::MalformedMetric { .. }));
    }

    #[tokio::test]
    async fn mismatched_record_is_rejected_before_storage() {
        let svc = service();
        let bad = Metric { id: "x".into(), kind: pulse_core::MetricKind::Gauge, delta: Some(1), value: None };

        assert!(svc.updates(&[bad]).await.is_err());
        assert!(svc.gauges().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let svc = service();
        assert!(svc.update_gauge("", 1.0).await.is_err());
        assert!(svc.update_counter("", 1).await.is_err());
    }

    #[tokio::test]
    async fn batch_applies_in_order() {
        let svc = service();
        svc.updates(&[
            Metric::counter("c", 3),
            Metric::counter("c", 4),
            Metric::gauge("g", 1.0),
        ])
        .await
        .unwrap();

        assert_eq!(svc.counter("c").await.unwrap(), 7);
        assert_eq!(svc.gauge("g").await.unwrap(), 1.0);
    }
}
