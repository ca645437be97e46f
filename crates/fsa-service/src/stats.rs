//! Read-path counters.
//!
//! Every counter is kept twice: a window that the stats loop takes and resets
//! on each tick, and lifetime totals for [`ReadStats::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fsa_config::{log_stats_debug, log_stats_info};
use serde::Serialize;

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicU64,
    read_micros: AtomicU64,
    catalog_misses: AtomicU64,
    physical_misses: AtomicU64,
}

impl Counters {
    fn load(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            read_micros: self.read_micros.load(Ordering::Relaxed),
            catalog_misses: self.catalog_misses.load(Ordering::Relaxed),
            physical_misses: self.physical_misses.load(Ordering::Relaxed),
        }
    }

    fn take(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.swap(0, Ordering::Relaxed),
            read_micros: self.read_micros.swap(0, Ordering::Relaxed),
            catalog_misses: self.catalog_misses.swap(0, Ordering::Relaxed),
            physical_misses: self.physical_misses.swap(0, Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReadStats {
    window: Counters,
    lifetime: Counters,
}

impl ReadStats {
    pub fn record_read(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        for counters in [&self.window, &self.lifetime] {
            counters.reads.fetch_add(1, Ordering::Relaxed);
            counters.read_micros.fetch_add(micros, Ordering::Relaxed);
        }
    }

    /// No catalog row for the requested id.
    pub fn record_catalog_miss(&self) {
        self.window.catalog_misses.fetch_add(1, Ordering::Relaxed);
        self.lifetime.catalog_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Catalog row present but the bytes are missing or corrupt.
    pub fn record_physical_miss(&self) {
        self.window.physical_misses.fetch_add(1, Ordering::Relaxed);
        self.lifetime.physical_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Lifetime totals.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.lifetime.load()
    }

    /// Current window, resetting it to zero.
    pub fn take_window(&self) -> StatsSnapshot {
        self.window.take()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub reads: u64,
    /// Cumulative read latency
    pub read_micros: u64,
    pub catalog_misses: u64,
    pub physical_misses: u64,
}

impl StatsSnapshot {
    pub fn avg_read_ms(&self) -> f64 {
        if self.reads == 0 {
            return 0.0;
        }
        self.read_micros as f64 / self.reads as f64 / 1000.0
    }

    pub fn is_idle(&self) -> bool {
        self.reads == 0 && self.catalog_misses == 0 && self.physical_misses == 0
    }
}

/// One stats tick: take the window and log it.
pub fn report(stats: &ReadStats, show_stats: bool) -> StatsSnapshot {
    let window = stats.take_window();
    if show_stats && !window.is_idle() {
        log_stats_info!(
            "Read stats",
            reads = window.reads,
            avg_ms = window.avg_read_ms(),
            catalog_misses = window.catalog_misses,
            physical_misses = window.physical_misses
        );
    } else {
        log_stats_debug!("Read stats", reads = window.reads);
    }
    window
}
