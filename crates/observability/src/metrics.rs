//! Engine metric helpers
//!
//! One naming scheme for everything the engine emits. The buffering and
//! scheduling crates record the hot-path counters themselves; these helpers
//! cover call sites outside the engine (demos, CLI, tests) plus a small
//! aggregator for end-of-run summaries.

use metrics::{counter, gauge, histogram};

/// Record samples pushed into a provider
pub fn record_samples_pushed(provider: &str, samples: u64) {
    counter!("pipeline_samples_pushed_total", "provider" => provider.to_string())
        .increment(samples);
}

/// Record a delivered window
pub fn record_window_delivered(provider: &str, frame: usize) {
    counter!("pipeline_windows_delivered_total", "provider" => provider.to_string()).increment(1);
    gauge!("pipeline_window_frame_samples", "provider" => provider.to_string())
        .set(frame as f64);
}

/// Record an overrun observed by a reader
pub fn record_overrun(provider: &str, lost_samples: u64) {
    counter!("pipeline_reader_overruns_total", "provider" => provider.to_string()).increment(1);
    counter!("pipeline_samples_lost_total", "provider" => provider.to_string())
        .increment(lost_samples);
}

/// Record one processing cycle's duration
pub fn record_cycle_duration_ms(component: &str, duration_ms: f64) {
    histogram!("pipeline_cycle_duration_ms", "component" => component.to_string())
        .record(duration_ms);
}

/// Streaming mean/min/max accumulator for end-of-run summaries
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            count: self.count,
            mean: if self.count > 0 {
                self.sum / self.count as f64
            } else {
                0.0
            },
            min: if self.count > 0 { self.min } else { 0.0 },
            max: if self.count > 0 { self.max } else { 0.0 },
        }
    }
}

/// Point-in-time summary of a [`RunningStats`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}
