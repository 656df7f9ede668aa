//! The wire-level metric record shared by the agent, the REST API and the
//! snapshot-independent parts of the daemon.
//!
//! A metric is identified by `(id, kind)`. Gauges carry a replacement `value`,
//! counters carry an accumulating `delta`; the field that does not match the
//! kind is absent on the wire.

use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};

/// Metric kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Gauge => f.write_str("gauge"),
            MetricKind::Counter => f.write_str("counter"),
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(PulseError::UnsupportedKind { kind: other.to_string() }),
        }
    }
}

/// One metric record as transmitted between agent and daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Unique metric name.
    pub id: String,

    /// Metric kind.
    #[serde(rename = "type")]
    pub kind: MetricKind,

    /// Increment for counter metrics, absent for gauges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,

    /// New value for gauge metrics, absent for counters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Metric {
    /// Build a gauge record.
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self { id: id.into(), kind: MetricKind::Gauge, delta: None, value: Some(value) }
    }

    /// Build a counter record.
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self { id: id.into(), kind: MetricKind::Counter, delta: Some(delta), value: None }
    }

    /// Check that the populated field matches the kind tag.
    ///
    /// The extra field of the other kind is tolerated on input; a missing
    /// matching field is not.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(PulseError::MalformedMetric { reason: "empty metric id".to_string() });
        }

        match self.kind {
            MetricKind::Gauge if self.value.is_none() => {
                Err(PulseError::MalformedMetric { reason: format!("gauge {} has no value", self.id) })
            }
            MetricKind::Counter if self.delta.is_none() => {
                Err(PulseError::MalformedMetric { reason: format!("counter {} has no delta", self.id) })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_round_trips_without_delta() {
        let m = Metric::gauge("Alloc", 42.5);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"id":"Alloc","type":"gauge","value":42.5}"#);

        let back: Metric = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn counter_round_trips_without_value() {
        let m = Metric::counter("PollCount", 7);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"id":"PollCount","type":"counter","delta":7}"#);

        let back: Metric = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn validate_rejects_field_mismatch() {
        let m = Metric { id: "x".into(), kind: MetricKind::Gauge, delta: Some(1), value: None };
        assert!(m.validate().is_err());

        let m = Metric { id: "x".into(), kind: MetricKind::Counter, delta: None, value: Some(1.0) };
        assert!(m.validate().is_err());

        let m = Metric { id: String::new(), kind: MetricKind::Counter, delta: Some(1), value: None };
        assert!(m.validate().is_err());
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let err = serde_json::from_str::<Metric>(r#"{"id":"x","type":"histogram"}"#);
        assert!(err.is_err());

        assert!("bogus".parse::<MetricKind>().is_err());
        assert_eq!("counter".parse::<MetricKind>().unwrap(), MetricKind::Counter);
    }
}
