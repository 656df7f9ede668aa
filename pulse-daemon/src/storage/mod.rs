//! Storage backends.
//!
//! Both backends implement [`Repository`]; the service layer and the
//! handlers never see which one is active.

use async_trait::async_trait;

use pulse_core::{Metric, Result};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStorage, MemoryStorageConfig};
pub use postgres::PostgresStorage;

/// Contract shared by the in-memory and the relational backend.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Replace the gauge value.
    async fn update_gauge(&self, name: &str, value: f64) -> Result<()>;

    /// Add `delta` to the counter, starting from zero for a new name.
    async fn update_counter(&self, name: &str, delta: i64) -> Result<()>;

    /// Gauge value by name.
    async fn gauge(&self, name: &str) -> Result<f64>;

    /// Counter value by name.
    async fn counter(&self, name: &str) -> Result<i64>;

    /// Apply a batch in the given order: counters accumulate, gauges replace.
    async fn updates(&self, metrics: &[Metric]) -> Result<()>;

    /// All gauges, for the summary view.
    async fn gauges(&self) -> Result<Vec<(String, f64)>>;

    /// All counters, for the summary view.
    async fn counters(&self) -> Result<Vec<(String, i64)>>;

    /// Liveness probe of the backing store.
    async fn ping(&self) -> Result<()>;
}
