//! Metric samplers.
//!
//! Two samplers run on independent schedulers: [`RuntimeSampler`] publishes
//! the fixed allocator gauge set plus `PollCount` and `RandomValue`,
//! [`HostSampler`] publishes host memory and CPU utilization. Each `poll`
//! call publishes its whole gauge set before returning.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Pid, ProcessRefreshKind, RefreshKind, System};
use tracing::debug;

use crate::alloc_stats;
use crate::storage::Storage;

/// Samples the process allocator and publishes the fixed runtime gauge set.
pub struct RuntimeSampler {
    storage: Arc<Storage>,
    system: System,
    pid: Pid,
    rng: StdRng,
}

impl RuntimeSampler {
    /// The PRNG behind `RandomValue` is seeded here, once, and never reseeded.
    pub fn new(storage: Arc<Storage>) -> Self {
        let pid = sysinfo::get_current_pid().expect("current pid is always resolvable");
        Self { storage, system: System::new(), pid, rng: StdRng::from_entropy() }
    }

    /// Publish one atomic set of runtime gauges and bump `PollCount`.
    pub fn poll(&mut self) {
        self.system.refresh_process_specifics(self.pid, ProcessRefreshKind::new().with_memory());

        let stats = alloc_stats::snapshot();
        let (rss, virt) = self
            .system
            .process(self.pid)
            .map(|p| (p.memory(), p.virtual_memory()))
            .unwrap_or((0, 0));

        let s = &self.storage;
        s.update_gauge("Alloc", stats.allocated as f64);
        s.update_gauge("BuckHashSys", 0.0);
        s.update_gauge("Frees", stats.frees as f64);
        s.update_gauge("GCCPUFraction", 0.0);
        s.update_gauge("GCSys", 0.0);
        s.update_gauge("HeapAlloc", stats.allocated as f64);
        s.update_gauge("HeapIdle", rss.saturating_sub(stats.allocated) as f64);
        s.update_gauge("HeapInuse", stats.allocated as f64);
        s.update_gauge("HeapObjects", stats.objects() as f64);
        s.update_gauge("HeapReleased", 0.0);
        s.update_gauge("HeapSys", rss as f64);
        s.update_gauge("LastGC", 0.0);
        s.update_gauge("Lookups", 0.0);
        s.update_gauge("MCacheSys", 0.0);
        s.update_gauge("MCacheInuse", 0.0);
        s.update_gauge("MSpanInuse", 0.0);
        s.update_gauge("MSpanSys", 0.0);
        s.update_gauge("Mallocs", stats.mallocs as f64);
        s.update_gauge("NextGC", 0.0);
        s.update_gauge("NumForcedGC", 0.0);
        s.update_gauge("NumGC", 0.0);
        s.update_gauge("OtherSys", 0.0);
        s.update_gauge("PauseTotalNs", 0.0);
        s.update_gauge("StackInuse", 0.0);
        s.update_gauge("StackSys", 0.0);
        s.update_gauge("Sys", virt as f64);
        s.update_gauge("TotalAlloc", stats.total_allocated as f64);

        s.update_counter("PollCount", 1);
        s.update_gauge("RandomValue", self.rng.gen::<f64>());

        debug!("poll done");
    }
}

/// Samples host-wide memory and CPU figures.
pub struct HostSampler {
    storage: Arc<Storage>,
    system: System,
}

impl HostSampler {
    pub fn new(storage: Arc<Storage>) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        Self { storage, system }
    }

    /// Publish `TotalMemory`, `FreeMemory` and `CPUutilization1`.
    pub fn poll(&mut self) {
        self.system.refresh_memory();
        self.system.refresh_cpu();

        let s = &self.storage;
        s.update_gauge("TotalMemory", self.system.total_memory() as f64);
        s.update_gauge("FreeMemory", self.system.free_memory() as f64);
        s.update_gauge("CPUutilization1", f64::from(self.system.global_cpu_info().cpu_usage()));

        debug!("host poll done");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_sampler_publishes_fixed_gauge_set() {
        let storage = Arc::new(Storage::new());
        let mut sampler = RuntimeSampler::new(Arc::clone(&storage));

        sampler.poll();

        // 27 allocator gauges plus RandomValue.
        assert_eq!(storage.total_gauges(), 28);
        assert_eq!(storage.total_counters(), 1);

        let counters = storage.counters();
        assert_eq!(counters, vec![("PollCount".to_string(), 1)]);

        sampler.poll();
        assert_eq!(storage.counters(), vec![("PollCount".to_string(), 2)]);
    }

    #[test]
    fn random_value_stays_in_unit_interval() {
        let storage = Arc::new(Storage::new());
        let mut sampler = RuntimeSampler::new(Arc::clone(&storage));

        for _ in 0..10 {
            sampler.poll();
            let value = storage
                .gauges()
                .into_iter()
                .find(|(name, _)| name == "RandomValue")
                .map(|(_, v)| v)
                .unwrap();
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn host_sampler_publishes_three_gauges() {
        let storage = Arc::new(Storage::new());
        let mut sampler = HostSampler::new(Arc::clone(&storage));

        sampler.poll();

        let mut names: Vec<String> = storage.gauges().into_iter().map(|(n, _)| n).collect();
        names.sort();
        assert_eq!(names, vec!["CPUutilization1", "FreeMemory", "TotalMemory"]);
    }
}
