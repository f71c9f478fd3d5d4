//! Delta engine
//!
//! Turns two time-ordered tick samples into percentages. The engine keeps
//! exactly one previous sample; the first sample after creation (or after
//! [`DeltaEngine::reset`]) only establishes a baseline.

use crate::core::cpu::{CoreTicks, CoreUsage, ProcessorSample, SampleDelta};
use log::debug;

/// Outcome of feeding a new sample to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaOutcome {
    /// A usable delta against the previous sample
    Ready(SampleDelta),
    /// No comparable previous sample; the new one is stored as the baseline
    BootstrapNeeded,
}

/// Compute per-core and aggregate percentages between two samples.
///
/// Cores are matched by index; the result covers the cores present in both.
/// Cores whose elapsed tick total is zero report 0 for every state.
pub fn compute_delta(previous: &ProcessorSample, current: &ProcessorSample) -> SampleDelta {
    let deltas: Vec<_> = current
        .cores
        .iter()
        .zip(previous.cores.iter())
        .map(|(now, before)| now.since(before))
        .collect();

    let aggregate = deltas
        .iter()
        .fold(CoreTicks::default(), |acc, d| acc + *d);

    SampleDelta {
        cores: deltas.iter().map(CoreUsage::from_ticks).collect(),
        aggregate: CoreUsage::from_ticks(&aggregate),
        elapsed_ticks: aggregate.total(),
    }
}

/// Holds the previous sample and diffs new samples against it
#[derive(Debug, Default)]
pub struct DeltaEngine {
    previous: Option<ProcessorSample>,
}

impl DeltaEngine {
    /// Create an engine with no baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `current` against the stored sample, then store `current`.
    ///
    /// Returns `BootstrapNeeded` when there is no baseline, or when the core
    /// count changed since the baseline was taken (hotplug); in both cases
    /// `current` becomes the new baseline.
    pub fn advance(&mut self, current: ProcessorSample) -> DeltaOutcome {
        let outcome = match self.previous.as_ref() {
            Some(previous) if previous.core_count() == current.core_count() => {
                DeltaOutcome::Ready(compute_delta(previous, &current))
            }
            Some(previous) => {
                debug!(
                    "core count changed from {} to {}, re-bootstrapping",
                    previous.core_count(),
                    current.core_count()
                );
                DeltaOutcome::BootstrapNeeded
            }
            None => {
                debug!("storing bootstrap sample ({} cores)", current.core_count());
                DeltaOutcome::BootstrapNeeded
            }
        };

        self.previous = Some(current);
        outcome
    }

    /// Whether a baseline sample is stored
    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    /// Drop the baseline; the next `advance` bootstraps again
    pub fn reset(&mut self) {
        self.previous = None;
    }
}
