//! Live free-memory sampling for early chunk cuts.
//!
//! The divider cuts a batch when its byte budget is reached. [`MemoryMonitor`] adds a second,
//! optional trigger: every `interval` records it samples system memory and reports pressure
//! when available memory drops below a fraction of total memory. Correctness never depends on
//! it; with sampling disabled the byte budget alone bounds memory.

use log::debug;
use sysinfo::System;

/// Default fraction of total memory that must stay available (25%).
pub const DEFAULT_MIN_FREE_FRACTION: f64 = 0.25;

/// Default number of records between samples.
pub const DEFAULT_SAMPLE_INTERVAL: u64 = 50_000;

/// Settings for free-memory sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryPressure {
    /// Cut a batch when available memory falls below this fraction of total.
    pub min_free_fraction: f64,
    /// Records between samples.
    pub sample_interval: u64,
}

impl Default for MemoryPressure {
    fn default() -> Self {
        Self { min_free_fraction: DEFAULT_MIN_FREE_FRACTION, sample_interval: DEFAULT_SAMPLE_INTERVAL }
    }
}

/// One observation of system memory, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    /// Memory available for new allocations.
    pub available: u64,
    /// Total physical memory.
    pub total: u64,
}

impl MemorySample {
    /// True when `available` is below `min_free_fraction` of `total`.
    ///
    /// An unknown total (zero) never reports pressure.
    #[must_use]
    pub fn under_pressure(&self, min_free_fraction: f64) -> bool {
        self.total > 0 && (self.available as f64) < (self.total as f64) * min_free_fraction
    }
}

/// Periodic system memory sampler.
pub struct MemoryMonitor {
    system: System,
    settings: MemoryPressure,
    since_sample: u64,
}

impl MemoryMonitor {
    /// Create a monitor with the given settings.
    #[must_use]
    pub fn new(settings: MemoryPressure) -> Self {
        Self { system: System::new(), settings, since_sample: 0 }
    }

    /// Take a fresh sample.
    pub fn sample(&mut self) -> MemorySample {
        self.system.refresh_memory();
        MemorySample { available: self.system.available_memory(), total: self.system.total_memory() }
    }

    /// Count one record; sample when the interval elapses and report pressure.
    pub fn tick(&mut self) -> bool {
        self.since_sample += 1;
        if self.since_sample < self.settings.sample_interval.max(1) {
            return false;
        }
        self.since_sample = 0;
        let sample = self.sample();
        let pressure = sample.under_pressure(self.settings.min_free_fraction);
        if pressure {
            debug!(
                "Memory pressure: {} of {} bytes available, cutting chunk early",
                sample.available, sample.total
            );
        }
        pressure
    }

    /// Restart the sampling interval (called after a batch is cut).
    pub fn reset(&mut self) {
        self.since_sample = 0;
    }
}
