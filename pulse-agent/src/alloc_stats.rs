//! Counting allocator that feeds the runtime sampler.
//!
//! Wraps the system allocator and keeps four atomic counters: bytes currently
//! allocated, bytes allocated since start, and the number of allocations and
//! frees. `main.rs` installs it with `#[global_allocator]`.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

static ALLOCATED: AtomicU64 = AtomicU64::new(0);
static TOTAL_ALLOCATED: AtomicU64 = AtomicU64::new(0);
static MALLOCS: AtomicU64 = AtomicU64::new(0);
static FREES: AtomicU64 = AtomicU64::new(0);

/// Allocator wrapper with byte and call accounting.
pub struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            ALLOCATED.fetch_add(layout.size() as u64, Ordering::Relaxed);
            TOTAL_ALLOCATED.fetch_add(layout.size() as u64, Ordering::Relaxed);
            MALLOCS.fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        ALLOCATED.fetch_sub(layout.size() as u64, Ordering::Relaxed);
        FREES.fetch_add(1, Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            let old = layout.size() as u64;
            let new = new_size as u64;
            if new > old {
                ALLOCATED.fetch_add(new - old, Ordering::Relaxed);
                TOTAL_ALLOCATED.fetch_add(new - old, Ordering::Relaxed);
            } else {
                ALLOCATED.fetch_sub(old - new, Ordering::Relaxed);
            }
        }
        new_ptr
    }
}

/// Point-in-time view of the allocator counters.
#[derive(Debug, Clone, Copy)]
pub struct AllocSnapshot {
    /// Bytes currently allocated.
    pub allocated: u64,
    /// Cumulative bytes allocated since process start.
    pub total_allocated: u64,
    /// Number of allocations since process start.
    pub mallocs: u64,
    /// Number of frees since process start.
    pub frees: u64,
}

impl AllocSnapshot {
    /// Live allocation count.
    pub fn objects(&self) -> u64 {
        self.mallocs.saturating_sub(self.frees)
    }
}

/// Read the current counter values.
pub fn snapshot() -> AllocSnapshot {
    AllocSnapshot {
        allocated: ALLOCATED.load(Ordering::Relaxed),
        total_allocated: TOTAL_ALLOCATED.load(Ordering::Relaxed),
        mallocs: MALLOCS.load(Ordering::Relaxed),
        frees: FREES.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_live_allocations() {
        let before = snapshot();

        // Box allocation must move every counter forward.
        let data = vec![0u8; 4096];
        let after = snapshot();

        assert!(after.total_allocated >= before.total_allocated + 4096);
        assert!(after.mallocs > before.mallocs);
        drop(data);

        let freed = snapshot();
        assert!(freed.frees > after.frees);
    }

    #[test]
    fn objects_never_underflows() {
        let s = AllocSnapshot { allocated: 0, total_allocated: 0, mallocs: 1, frees: 5 };
        assert_eq!(s.objects(), 0);
    }
}
