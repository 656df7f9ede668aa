//! In-process metric accumulator shared by the samplers and the reporter.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

/// Thread-safe gauge map plus counter accumulator.
///
/// One mutex guards both maps; every operation is a single lock acquisition,
/// so per-name updates are linearizable. The reporter snapshots with
/// [`Storage::gauges`]/[`Storage::counters`] and then resets each reported
/// counter by applying the negated value, which preserves increments that
/// land between the snapshot and the reset.
#[derive(Default)]
pub struct Storage {
    inner: Mutex<Inner>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the gauge value.
    pub fn update_gauge(&self, name: &str, value: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.gauges.insert(name.to_string(), value);
    }

    /// Add `delta` to the counter, starting from zero for a new name.
    pub fn update_counter(&self, name: &str, delta: i64) {
        let mut inner = self.inner.lock().unwrap();
        *inner.counters.entry(name.to_string()).or_insert(0) += delta;
    }

    /// Snapshot of all gauges. Ordering among entries is unspecified.
    pub fn gauges(&self) -> Vec<(String, f64)> {
        let inner = self.inner.lock().unwrap();
        inner.gauges.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// Snapshot of all counters. Ordering among entries is unspecified.
    pub fn counters(&self) -> Vec<(String, i64)> {
        let inner = self.inner.lock().unwrap();
        inner.counters.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    pub fn total_gauges(&self) -> usize {
        self.inner.lock().unwrap().gauges.len()
    }

    pub fn total_counters(&self) -> usize {
        self.inner.lock().unwrap().counters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn gauge_update_replaces() {
        let s = Storage::new();
        s.update_gauge("Alloc", 1.0);
        s.update_gauge("Alloc", 2.5);

        let gauges = s.gauges();
        assert_eq!(gauges, vec![("Alloc".to_string(), 2.5)]);
    }

    #[test]
    fn counter_update_accumulates() {
        let s = Storage::new();
        s.update_counter("PollCount", 3);
        s.update_counter("PollCount", 4);

        let counters = s.counters();
        assert_eq!(counters, vec![("PollCount".to_string(), 7)]);
    }

    #[test]
    fn snapshot_then_negate_preserves_interleaved_increments() {
        let s = Storage::new();
        s.update_counter("PollCount", 10);

        let snapshot = s.counters();
        // A sampler fires between the snapshot and the reset.
        s.update_counter("PollCount", 2);

        for (name, value) in snapshot {
            s.update_counter(&name, -value);
        }

        assert_eq!(s.counters(), vec![("PollCount".to_string(), 2)]);
    }

    #[test]
    fn concurrent_counter_updates_are_not_lost() {
        let s = Arc::new(Storage::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let s = Arc::clone(&s);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    s.update_counter("PollCount", 1);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(s.counters(), vec![("PollCount".to_string(), 8000)]);
    }

    #[test]
    fn totals_report_map_sizes() {
        let s = Storage::new();
        s.update_gauge("a", 1.0);
        s.update_gauge("b", 2.0);
        s.update_counter("c", 1);

        assert_eq!(s.total_gauges(), 2);
        assert_eq!(s.total_counters(), 1);
    }
}
