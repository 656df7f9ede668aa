//! gRPC frontend.
//!
//! Mirrors the REST semantics: counters accumulate, gauges replace, batches
//! apply in order. Failures travel in the response envelope's `error` field,
//! not as transport-level status codes.

use tonic::codec::CompressionEncoding;
use tonic::{Request, Response, Status};
use tracing::error;

use pulse_api::pulse::v1::metrics_server::{Metrics, MetricsServer};
use pulse_api::pulse::v1::{metric, Empty, UpdateRequest, UpdatesRequest};
use pulse_core::Metric;

use crate::service::MetricsService;

type Reply = pulse_api::pulse::v1::Response;

/// `Metrics` service implementation over the shared service handle.
pub struct MetricsGrpc {
    service: MetricsService,
}

impl MetricsGrpc {
    pub fn new(service: MetricsService) -> Self {
        Self { service }
    }

    /// Wrap into a tonic server with gzip in both directions.
    pub fn into_server(self) -> MetricsServer<Self> {
        MetricsServer::new(self)
            .accept_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Gzip)
    }
}

#[tonic::async_trait]
impl Metrics for MetricsGrpc {
    async fn ping(&self, _request: Request<Empty>) -> Result<Response<Reply>, Status> {
        let mut reply = Reply::default();

        if let Err(e) = self.service.ping().await {
            error!(error = %e, "grpc ping failed");
            reply.error = e.to_string();
        }

        Ok(Response::new(reply))
    }

    async fn update(&self, request: Request<UpdateRequest>) -> Result<Response<Reply>, Status> {
        let mut reply = Reply::default();

        let result = match request.into_inner().metric.and_then(|m| m.kind) {
            Some(metric::Kind::Gauge(g)) => self.service.update_gauge(&g.name, g.value).await,
            Some(metric::Kind::Counter(c)) => self.service.update_counter(&c.name, c.value).await,
            None => {
                reply.error = "wrong metric type".to_string();
                return Ok(Response::new(reply));
            }
        };

        if let Err(e) = result {
            error!(error = %e, "grpc update failed");
            reply.error = e.to_string();
        }

        Ok(Response::new(reply))
    }

    async fn updates(&self, request: Request<UpdatesRequest>) -> Result<Response<Reply>, Status> {
        let mut reply = Reply::default();

        let metrics: Vec<Metric> = request
            .into_inner()
            .metrics
            .into_iter()
            .filter_map(|m| m.kind)
            .map(|kind| match kind {
                metric::Kind::Gauge(g) => Metric::gauge(g.name, g.value),
                metric::Kind::Counter(c) => Metric::counter(c.name, c.value),
            })
            .collect();

        if let Err(e) = self.service.updates(&metrics).await {
            error!(error = %e, "grpc batch update failed");
            reply.error = e.to_string();
        }

        Ok(Response::new(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, MemoryStorageConfig};
    use std::sync::Arc;
    use std::time::Duration;

    fn grpc() -> (MetricsGrpc, MetricsService) {
        let config = MemoryStorageConfig {
            store_interval: Duration::ZERO,
            store_file: None,
            restore: false,
        };
        let service = MetricsService::new(Arc::new(MemoryStorage::new(config).unwrap()));
        (MetricsGrpc::new(service.clone()), service)
    }

    fn gauge(name: &str, value: f64) -> pulse_api::pulse::v1::Metric {
        pulse_api::pulse::v1::Metric {
            kind: Some(metric::Kind::Gauge(metric::Gauge { name: name.to_string(), value })),
        }
    }

    fn counter(name: &str, value: i64) -> pulse_api::pulse::v1::Metric {
        pulse_api::pulse::v1::Metric {
            kind: Some(metric::Kind::Counter(metric::Counter { name: name.to_string(), value })),
        }
    }

    #[tokio::test]
    async fn ping_succeeds_with_empty_error() {
        let (grpc, _) = grpc();

        let reply = grpc.ping(Request::new(Empty {})).await.unwrap().into_inner();
        assert!(reply.error.is_empty());
    }

    #[tokio::test]
    async fn update_applies_both_kinds() {
        let (grpc, service) = grpc();

        let reply = grpc
            .update(Request::new(UpdateRequest { metric: Some(gauge("g", 1.5)) }))
            .await
            .unwrap()
            .into_inner();
        assert!(reply.error.is_empty());

        for _ in 0..2 {
            let reply = grpc
                .update(Request::new(UpdateRequest { metric: Some(counter("c", 3)) }))
                .await
                .unwrap()
                .into_inner();
            assert!(reply.error.is_empty());
        }

        assert_eq!(service.gauge("g").await.unwrap(), 1.5);
        assert_eq!(service.counter("c").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn missing_metric_reports_error_in_envelope() {
        let (grpc, _) = grpc();

        let reply = grpc
            .update(Request::new(UpdateRequest { metric: None }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.error, "wrong metric type");
    }

    #[tokio::test]
    async fn batch_accumulates_in_order() {
        let (grpc, service) = grpc();

        let reply = grpc
            .updates(Request::new(UpdatesRequest {
                metrics: vec![gauge("g", 1.0), counter("c", 3), counter("c", 4)],
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(reply.error.is_empty());

        assert_eq!(service.gauge("g").await.unwrap(), 1.0);
        assert_eq!(service.counter("c").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn empty_batch_reports_error_in_envelope() {
        let (grpc, _) = grpc();

        let reply = grpc
            .updates(Request::new(UpdatesRequest { metrics: vec![] }))
            .await
            .unwrap()
            .into_inner();
        assert!(!reply.error.is_empty());
    }
}
