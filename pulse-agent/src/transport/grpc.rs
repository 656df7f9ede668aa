//! gRPC report transport with gzip-compressed RPC payloads.

use async_trait::async_trait;
use tonic::codec::CompressionEncoding;
use tonic::transport::Channel;

use pulse_api::pulse::v1::metrics_client::MetricsClient;
use pulse_api::pulse::v1::{metric, Metric as ProtoMetric, UpdatesRequest};
use pulse_core::{Metric, MetricKind, PulseError, Result};

use super::Transport;

/// Pushes report batches over the `Metrics.Updates` RPC.
pub struct GrpcTransport {
    client: MetricsClient<Channel>,
}

impl GrpcTransport {
    /// Connect to the daemon's gRPC listener.
    pub async fn connect(address: &str) -> Result<Self> {
        let client = MetricsClient::connect(format!("http://{address}"))
            .await
            .map_err(|e| PulseError::transport(format!("failed to connect to {address}: {e}")))?
            .send_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Gzip);

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    async fn send(&self, batch: &[Metric]) -> Result<()> {
        let metrics: Vec<ProtoMetric> = batch.iter().map(to_proto).collect();

        // Channels are cheap to clone; tonic clients take &mut self.
        let mut client = self.client.clone();

        let response = client
            .updates(UpdatesRequest { metrics })
            .await
            .map_err(|status| PulseError::transport(format!("updates rpc failed: {status}")))?
            .into_inner();

        if !response.error.is_empty() {
            return Err(PulseError::Transport { reason: response.error });
        }

        Ok(())
    }
}

fn to_proto(m: &Metric) -> ProtoMetric {
    let kind = match m.kind {
        MetricKind::Gauge => metric::Kind::Gauge(metric::Gauge {
            name: m.id.clone(),
            value: m.value.unwrap_or_default(),
        }),
        MetricKind::Counter => metric::Kind::Counter(metric::Counter {
            name: m.id.clone(),
            value: m.delta.unwrap_or_default(),
        }),
    };

    ProtoMetric { kind: Some(kind) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_conversion_keeps_kind_and_value() {
        let proto = to_proto(&Metric::gauge("Alloc", 12.5));
        match proto.kind.unwrap() {
            metric::Kind::Gauge(g) => {
                assert_eq!(g.name, "Alloc");
                assert_eq!(g.value, 12.5);
            }
            other => panic!("expected gauge, got {other:?}"),
        }

        let proto = to_proto(&Metric::counter("PollCount", 4));
        match proto.kind.unwrap() {
            metric::Kind::Counter(c) => {
                assert_eq!(c.name, "PollCount");
                assert_eq!(c.value, 4);
            }
            other => panic!("expected counter, got {other:?}"),
        }
    }
}
