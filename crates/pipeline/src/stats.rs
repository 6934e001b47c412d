//! Run counters shared by all component tasks

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared atomic counters, one instance per pipeline run
#[derive(Debug, Default)]
pub struct RunStats {
    pub cycles_run: AtomicU64,
    pub cycles_skipped: AtomicU64,
    pub components_disabled: AtomicU64,
    pub components_stopped: AtomicU64,
    pub source_errors: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self) {
        self.cycles_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_cycle(&self) {
        self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disabled(&self) {
        self.components_disabled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stopped(&self) {
        self.components_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles_run: self.cycles_run.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            components_disabled: self.components_disabled.load(Ordering::Relaxed),
            components_stopped: self.components_stopped.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cycles_run: u64,
    pub cycles_skipped: u64,
    pub components_disabled: u64,
    pub components_stopped: u64,
    pub source_errors: u64,
}
