//! Rolling timing baseline for self-test probes.
//!
//! The first sample ever recorded is a cold start and is discarded. The next `ramp_up`
//! samples set `normal_time_ms` to their running mean and `max_time_ms` to
//! `normal * (100 + tolerance) / 100`. After that the baseline is locked.

use std::sync::{Mutex, MutexGuard};

/// Sentinel `max_time_ms` used before any baseline exists.
pub const UNBOUNDED_MAX_TIME_MS: u64 = u64::MAX;

/// Snapshot of the probe baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeBaseline {
    /// Number of non-discarded samples folded into the mean.
    pub sample_count: u32,
    /// Sum of the non-discarded samples.
    pub total_ms: u64,
    /// Mean of the non-discarded samples.
    pub normal_time_ms: u64,
    /// Threshold above which a probe is considered slow.
    pub max_time_ms: u64,
    /// Whether the cold-start sample has been seen.
    pub cold_start_discarded: bool,
    /// Whether the ramp-up window is complete and the baseline locked.
    pub warmed_up: bool,
}

impl ProbeBaseline {
    const fn empty() -> Self {
        Self {
            sample_count: 0,
            total_ms: 0,
            normal_time_ms: 0,
            max_time_ms: UNBOUNDED_MAX_TIME_MS,
            cold_start_discarded: false,
            warmed_up: false,
        }
    }
}

/// Mutex-guarded probe timing model shared by concurrent probe requests.
#[derive(Debug)]
pub struct ProbeTimingModel {
    tolerance_percent: u32,
    ramp_up: u32,
    state: Mutex<ProbeBaseline>,
}

impl ProbeTimingModel {
    /// Create a model with the given tolerance percentage and ramp-up sample count.
    #[must_use]
    pub const fn new(tolerance_percent: u32, ramp_up: u32) -> Self {
        Self {
            tolerance_percent,
            ramp_up,
            state: Mutex::new(ProbeBaseline::empty()),
        }
    }

    /// Configured tolerance percentage.
    #[must_use]
    pub const fn tolerance_percent(&self) -> u32 {
        self.tolerance_percent
    }

    /// Fold a probe duration into the baseline and return `(normal_time_ms, max_time_ms)`.
    pub fn record(&self, duration_ms: u64) -> (u64, u64) {
        let mut state = self.lock();
        if !state.cold_start_discarded {
            state.cold_start_discarded = true;
        } else if state.sample_count < self.ramp_up {
            state.sample_count += 1;
            state.total_ms = state.total_ms.saturating_add(duration_ms);
            state.normal_time_ms = state.total_ms / u64::from(state.sample_count);
            state.max_time_ms = state
                .normal_time_ms
                .saturating_mul(100 + u64::from(self.tolerance_percent))
                / 100;
            state.warmed_up = state.sample_count >= self.ramp_up;
        }
        (state.normal_time_ms, state.max_time_ms)
    }

    /// Whether an observed probe duration is within the current threshold.
    #[must_use]
    pub fn is_healthy(&self, observed_ms: u64) -> bool {
        observed_ms <= self.lock().max_time_ms
    }

    /// Current baseline.
    #[must_use]
    pub fn snapshot(&self) -> ProbeBaseline {
        *self.lock()
    }

    /// Forget all samples, including the cold start.
    pub fn reset(&self) {
        *self.lock() = ProbeBaseline::empty();
    }

    fn lock(&self) -> MutexGuard<'_, ProbeBaseline> {
        // The baseline is plain data; a panic mid-update cannot leave it unusable.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
