//! Pluggable report delivery.
//!
//! Exactly one transport is active per run; [`crate::config::AgentConfig`]
//! rejects configurations that name both.

use async_trait::async_trait;

use pulse_core::{Metric, Result};

pub mod grpc;
pub mod http;

pub use grpc::GrpcTransport;
pub use http::HttpTransport;

/// Delivers one report batch to the daemon.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, batch: &[Metric]) -> Result<()>;
}
