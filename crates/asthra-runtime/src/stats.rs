//! Process-wide statistics registry.
//!
//! Four sub-domains (memory, gc, performance, concurrency) each own a set of
//! [`AtomicCounter`]s. All mutators are gated on an atomic `enabled` flag;
//! snapshots are eventually consistent across counters (each counter is read
//! independently under acquire ordering), which is acceptable for
//! observability per spec §4.2.

use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};

use crate::atomics::{AtomicCounter, MemOrder, MAX_SENTINEL, MIN_SENTINEL};

/// Snapshot of the memory domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemorySnapshot {
    pub bytes_allocated: u64,
    pub bytes_deallocated: u64,
    pub current_memory_usage: u64,
    pub peak_memory_usage: u64,
    pub allocation_failures: u64,
    pub allocation_count: u64,
    pub deallocation_count: u64,
}

/// Snapshot of the GC domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GcSnapshot {
    pub collections_run: u64,
    pub total_collection_time_ns: u64,
    pub min_collection_time_ns: u64,
    pub max_collection_time_ns: u64,
}

/// Snapshot of the performance domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PerformanceSnapshot {
    pub compilation_count: u64,
    pub total_compilation_time_ns: u64,
    pub files_compiled: u64,
    pub lines_compiled: u64,
}

/// Snapshot of the concurrency domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConcurrencySnapshot {
    pub threads_created: u64,
    pub threads_destroyed: u64,
    pub tasks_spawned: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_cancelled: u64,
    pub callbacks_enqueued: u64,
    pub callbacks_processed: u64,
}

/// System-level fields reported alongside the four domains, per spec §6's
/// JSON schema (`system.statistics_enabled`, `system.uptime_ns`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SystemSnapshot {
    pub statistics_enabled: bool,
    pub uptime_ns: u64,
}

/// A full, point-in-time snapshot of every counter domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatisticsSnapshot {
    pub memory: MemorySnapshot,
    pub gc: GcSnapshot,
    pub performance: PerformanceSnapshot,
    pub concurrency: ConcurrencySnapshot,
    pub system: SystemSnapshot,
}

#[derive(Default)]
struct MemoryDomain {
    bytes_allocated: AtomicCounter,
    bytes_deallocated: AtomicCounter,
    peak_memory_usage: AtomicCounter,
    allocation_failures: AtomicCounter,
    allocation_count: AtomicCounter,
    deallocation_count: AtomicCounter,
}

struct GcDomain {
    collections_run: AtomicCounter,
    total_collection_time_ns: AtomicCounter,
    min_collection_time_ns: AtomicCounter,
    max_collection_time_ns: AtomicCounter,
}

impl Default for GcDomain {
    fn default() -> Self {
        Self {
            collections_run: AtomicCounter::new(0),
            total_collection_time_ns: AtomicCounter::new(0),
            min_collection_time_ns: AtomicCounter::new(MIN_SENTINEL),
            max_collection_time_ns: AtomicCounter::new(MAX_SENTINEL),
        }
    }
}

#[derive(Default)]
struct PerformanceDomain {
    compilation_count: AtomicCounter,
    total_compilation_time_ns: AtomicCounter,
    files_compiled: AtomicCounter,
    lines_compiled: AtomicCounter,
}

#[derive(Default)]
struct ConcurrencyDomain {
    threads_created: AtomicCounter,
    threads_destroyed: AtomicCounter,
    tasks_spawned: AtomicCounter,
    tasks_completed: AtomicCounter,
    tasks_failed: AtomicCounter,
    tasks_cancelled: AtomicCounter,
    callbacks_enqueued: AtomicCounter,
    callbacks_processed: AtomicCounter,
}

/// Process-wide statistics registry. Construct one instance and share it
/// (typically behind an `Arc`, or as a `'static` once-initialized value owned
/// by the driver) across the compiler and any linked runtime bridge.
pub struct StatisticsRegistry {
    enabled: std::sync::atomic::AtomicBool,
    start_time_ns: AtomicCounter,
    memory: MemoryDomain,
    gc: GcDomain,
    performance: PerformanceDomain,
    concurrency: ConcurrencyDomain,
}

impl Default for StatisticsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsRegistry {
    pub fn new() -> Self {
        Self {
            enabled: std::sync::atomic::AtomicBool::new(false),
            start_time_ns: AtomicCounter::new(0),
            memory: MemoryDomain::default(),
            gc: GcDomain::default(),
            performance: PerformanceDomain::default(),
            concurrency: ConcurrencyDomain::default(),
        }
    }

    /// Idempotent. Sets start time, enables collection, primes
    /// `min_collection_time_ns` to its sentinel.
    pub fn init(&self) {
        self.start_time_ns
            .store(crate::atomics::monotonic_now_ns(), MemOrder::Release);
        self.gc.min_collection_time_ns.store(MIN_SENTINEL, MemOrder::Release);
        self.gc.max_collection_time_ns.store(MAX_SENTINEL, MemOrder::Release);
        self.enabled.store(true, Ordering::Release);
        log::trace!("statistics registry initialized");
    }

    /// Idempotent.
    pub fn shutdown(&self) {
        self.enabled.store(false, Ordering::Release);
        log::trace!("statistics registry shut down");
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Zeroes all counters, preserves `enabled` and `start_time`.
    pub fn reset(&self) {
        let m = &self.memory;
        m.bytes_allocated.store(0, MemOrder::Relaxed);
        m.bytes_deallocated.store(0, MemOrder::Relaxed);
        m.peak_memory_usage.store(0, MemOrder::Relaxed);
        m.allocation_failures.store(0, MemOrder::Relaxed);
        m.allocation_count.store(0, MemOrder::Relaxed);
        m.deallocation_count.store(0, MemOrder::Relaxed);

        self.gc.collections_run.store(0, MemOrder::Relaxed);
        self.gc.total_collection_time_ns.store(0, MemOrder::Relaxed);
        self.gc.min_collection_time_ns.store(MIN_SENTINEL, MemOrder::Relaxed);
        self.gc.max_collection_time_ns.store(MAX_SENTINEL, MemOrder::Relaxed);

        let p = &self.performance;
        p.compilation_count.store(0, MemOrder::Relaxed);
        p.total_compilation_time_ns.store(0, MemOrder::Relaxed);
        p.files_compiled.store(0, MemOrder::Relaxed);
        p.lines_compiled.store(0, MemOrder::Relaxed);

        let c = &self.concurrency;
        c.threads_created.store(0, MemOrder::Relaxed);
        c.threads_destroyed.store(0, MemOrder::Relaxed);
        c.tasks_spawned.store(0, MemOrder::Relaxed);
        c.tasks_completed.store(0, MemOrder::Relaxed);
        c.tasks_failed.store(0, MemOrder::Relaxed);
        c.tasks_cancelled.store(0, MemOrder::Relaxed);
        c.callbacks_enqueued.store(0, MemOrder::Relaxed);
        c.callbacks_processed.store(0, MemOrder::Relaxed);
        log::trace!("statistics registry reset");
    }

    // -- memory domain --------------------------------------------------

    pub fn update_allocation(&self, size: u64) {
        if !self.is_enabled() {
            return;
        }
        self.memory.bytes_allocated.fetch_add(size, MemOrder::Relaxed);
        self.memory.allocation_count.fetch_add(1, MemOrder::Relaxed);
        let current = self.current_memory_usage();
        self.memory.peak_memory_usage.fetch_update_max(current, MemOrder::AcqRel);
    }

    pub fn update_deallocation(&self, size: u64) {
        if !self.is_enabled() {
            return;
        }
        self.memory.bytes_deallocated.fetch_add(size, MemOrder::Relaxed);
        self.memory.deallocation_count.fetch_add(1, MemOrder::Relaxed);
    }

    pub fn record_allocation_failure(&self) {
        if !self.is_enabled() {
            return;
        }
        self.memory.allocation_failures.fetch_add(1, MemOrder::Relaxed);
    }

    fn current_memory_usage(&self) -> u64 {
        let allocated = self.memory.bytes_allocated.load(MemOrder::Acquire);
        let deallocated = self.memory.bytes_deallocated.load(MemOrder::Acquire);
        allocated.saturating_sub(deallocated)
    }

    // -- gc domain --------------------------------------------------------

    pub fn update_gc_collection(&self, duration_ns: u64) {
        if !self.is_enabled() {
            return;
        }
        self.gc.collections_run.fetch_add(1, MemOrder::Relaxed);
        self.gc.total_collection_time_ns.fetch_add(duration_ns, MemOrder::Relaxed);
        self.gc.min_collection_time_ns.fetch_update_min(duration_ns, MemOrder::AcqRel);
        self.gc.max_collection_time_ns.fetch_update_max(duration_ns, MemOrder::AcqRel);
    }

    // -- performance domain ------------------------------------------------

    pub fn update_compilation(&self, time_ns: u64, files: u64, lines: u64) {
        if !self.is_enabled() {
            return;
        }
        self.performance.compilation_count.fetch_add(1, MemOrder::Relaxed);
        self.performance
            .total_compilation_time_ns
            .fetch_add(time_ns, MemOrder::Relaxed);
        self.performance.files_compiled.fetch_add(files, MemOrder::Relaxed);
        self.performance.lines_compiled.fetch_add(lines, MemOrder::Relaxed);
    }

    // -- concurrency domain -------------------------------------------------

    pub fn record_thread_created(&self) {
        if self.is_enabled() {
            self.concurrency.threads_created.fetch_add(1, MemOrder::Relaxed);
        }
    }

    pub fn record_thread_destroyed(&self) {
        if self.is_enabled() {
            self.concurrency.threads_destroyed.fetch_add(1, MemOrder::Relaxed);
        }
    }

    pub fn record_task_spawned(&self) {
        if self.is_enabled() {
            self.concurrency.tasks_spawned.fetch_add(1, MemOrder::Relaxed);
        }
    }

    pub fn record_task_completed(&self) {
        if self.is_enabled() {
            self.concurrency.tasks_completed.fetch_add(1, MemOrder::Relaxed);
        }
    }

    pub fn record_task_failed(&self) {
        if self.is_enabled() {
            self.concurrency.tasks_failed.fetch_add(1, MemOrder::Relaxed);
        }
    }

    pub fn record_task_cancelled(&self) {
        if self.is_enabled() {
            self.concurrency.tasks_cancelled.fetch_add(1, MemOrder::Relaxed);
        }
    }

    pub fn record_callback_enqueued(&self) {
        if self.is_enabled() {
            self.concurrency.callbacks_enqueued.fetch_add(1, MemOrder::Relaxed);
        }
    }

    pub fn record_callback_processed(&self) {
        if self.is_enabled() {
            self.concurrency.callbacks_processed.fetch_add(1, MemOrder::Relaxed);
        }
    }

    /// Reads every counter under acquire ordering. If disabled, returns a
    /// zero-valued snapshot rather than partial data.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        if !self.is_enabled() {
            return StatisticsSnapshot::default();
        }
        let min_gc = self.gc.min_collection_time_ns.load(MemOrder::Acquire);
        StatisticsSnapshot {
            memory: MemorySnapshot {
                bytes_allocated: self.memory.bytes_allocated.load(MemOrder::Acquire),
                bytes_deallocated: self.memory.bytes_deallocated.load(MemOrder::Acquire),
                current_memory_usage: self.current_memory_usage(),
                peak_memory_usage: self.memory.peak_memory_usage.load(MemOrder::Acquire),
                allocation_failures: self.memory.allocation_failures.load(MemOrder::Acquire),
                allocation_count: self.memory.allocation_count.load(MemOrder::Acquire),
                deallocation_count: self.memory.deallocation_count.load(MemOrder::Acquire),
            },
            gc: GcSnapshot {
                collections_run: self.gc.collections_run.load(MemOrder::Acquire),
                total_collection_time_ns: self.gc.total_collection_time_ns.load(MemOrder::Acquire),
                min_collection_time_ns: if min_gc == MIN_SENTINEL { 0 } else { min_gc },
                max_collection_time_ns: self.gc.max_collection_time_ns.load(MemOrder::Acquire),
            },
            performance: PerformanceSnapshot {
                compilation_count: self.performance.compilation_count.load(MemOrder::Acquire),
                total_compilation_time_ns: self
                    .performance
                    .total_compilation_time_ns
                    .load(MemOrder::Acquire),
                files_compiled: self.performance.files_compiled.load(MemOrder::Acquire),
                lines_compiled: self.performance.lines_compiled.load(MemOrder::Acquire),
            },
            concurrency: ConcurrencySnapshot {
                threads_created: self.concurrency.threads_created.load(MemOrder::Acquire),
                threads_destroyed: self.concurrency.threads_destroyed.load(MemOrder::Acquire),
                tasks_spawned: self.concurrency.tasks_spawned.load(MemOrder::Acquire),
                tasks_completed: self.concurrency.tasks_completed.load(MemOrder::Acquire),
                tasks_failed: self.concurrency.tasks_failed.load(MemOrder::Acquire),
                tasks_cancelled: self.concurrency.tasks_cancelled.load(MemOrder::Acquire),
                callbacks_enqueued: self.concurrency.callbacks_enqueued.load(MemOrder::Acquire),
                callbacks_processed: self.concurrency.callbacks_processed.load(MemOrder::Acquire),
            },
            system: SystemSnapshot {
                statistics_enabled: true,
                uptime_ns: crate::atomics::monotonic_now_ns()
                    .saturating_sub(self.start_time_ns.load(MemOrder::Acquire)),
            },
        }
    }

    /// Formats the snapshot as a multi-section human-readable report.
    pub fn print_report(&self, sink: &mut dyn std::fmt::Write) -> std::fmt::Result {
        let s = self.snapshot();
        writeln!(sink, "=== Asthra Runtime Statistics ===")?;
        writeln!(sink, "[memory]")?;
        writeln!(sink, "  bytes_allocated       = {}", s.memory.bytes_allocated)?;
        writeln!(sink, "  bytes_deallocated     = {}", s.memory.bytes_deallocated)?;
        writeln!(sink, "  current_memory_usage  = {}", s.memory.current_memory_usage)?;
        writeln!(sink, "  peak_memory_usage     = {}", s.memory.peak_memory_usage)?;
        writeln!(sink, "  allocation_failures   = {}", s.memory.allocation_failures)?;
        writeln!(sink, "[gc]")?;
        writeln!(sink, "  collections_run       = {}", s.gc.collections_run)?;
        writeln!(sink, "  total_collection_time_ns = {}", s.gc.total_collection_time_ns)?;
        writeln!(sink, "  min_collection_time_ns   = {}", s.gc.min_collection_time_ns)?;
        writeln!(sink, "  max_collection_time_ns   = {}", s.gc.max_collection_time_ns)?;
        writeln!(sink, "[performance]")?;
        writeln!(sink, "  compilation_count     = {}", s.performance.compilation_count)?;
        writeln!(sink, "  files_compiled        = {}", s.performance.files_compiled)?;
        writeln!(sink, "  lines_compiled        = {}", s.performance.lines_compiled)?;
        writeln!(sink, "[concurrency]")?;
        writeln!(sink, "  threads_created       = {}", s.concurrency.threads_created)?;
        writeln!(sink, "  tasks_spawned         = {}", s.concurrency.tasks_spawned)?;
        writeln!(sink, "  tasks_completed       = {}", s.concurrency.tasks_completed)?;
        writeln!(sink, "[system]")?;
        writeln!(sink, "  statistics_enabled    = {}", s.system.statistics_enabled)?;
        writeln!(sink, "  uptime_ns             = {}", s.system.uptime_ns)?;
        Ok(())
    }

    /// Serializes the snapshot to the JSON schema in spec §6. Returns `None`
    /// on serialization failure (callers should fall back to `print_report`).
    pub fn export_json(&self) -> Option<String> {
        serde_json::to_string_pretty(&self.snapshot()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_then_deallocation_restores_usage() {
        let reg = StatisticsRegistry::new();
        reg.init();
        reg.update_allocation(100);
        reg.update_allocation(50);
        reg.update_deallocation(100);
        let before = reg.snapshot().memory.current_memory_usage;
        reg.update_allocation(30);
        reg.update_deallocation(30);
        let after = reg.snapshot().memory.current_memory_usage;
        assert_eq!(before, after);
    }

    #[test]
    fn peak_memory_is_non_decreasing() {
        let reg = StatisticsRegistry::new();
        reg.init();
        reg.update_allocation(100);
        let p1 = reg.snapshot().memory.peak_memory_usage;
        reg.update_deallocation(90);
        reg.update_allocation(5);
        let p2 = reg.snapshot().memory.peak_memory_usage;
        assert!(p2 >= p1);
    }

    #[test]
    fn reset_preserves_enabled_flag() {
        let reg = StatisticsRegistry::new();
        reg.init();
        reg.update_allocation(10);
        reg.reset();
        assert!(reg.is_enabled());
        assert_eq!(reg.snapshot().memory.bytes_allocated, 0);
    }

    #[test]
    fn disabled_registry_yields_zero_snapshot() {
        let reg = StatisticsRegistry::new();
        reg.update_allocation(10);
        assert_eq!(reg.snapshot(), StatisticsSnapshot::default());
    }

    #[test]
    fn export_json_round_trips_schema_keys() {
        let reg = StatisticsRegistry::new();
        reg.init();
        reg.update_allocation(42);
        let json = reg.export_json().expect("serialization should succeed");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for key in ["memory", "gc", "performance", "concurrency", "system"] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert!(value["system"]["statistics_enabled"].as_bool().unwrap());
    }
}
