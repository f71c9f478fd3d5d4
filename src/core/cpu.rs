//! CPU sample and snapshot types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Raw scheduler tick counters for one core
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreTicks {
    /// Ticks spent in user mode
    pub user: u64,
    /// Ticks spent in kernel mode
    pub system: u64,
    /// Idle ticks
    pub idle: u64,
    /// Ticks spent in low priority user mode
    pub nice: u64,
}

impl CoreTicks {
    /// Sum of all four states, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.user
            .saturating_add(self.system)
            .saturating_add(self.idle)
            .saturating_add(self.nice)
    }

    /// Per-state difference against an earlier reading.
    ///
    /// Counters that went backwards (core offlined, counter reset) yield zero.
    pub fn since(&self, earlier: &CoreTicks) -> CoreTicks {
        CoreTicks {
            user: self.user.saturating_sub(earlier.user),
            system: self.system.saturating_sub(earlier.system),
            idle: self.idle.saturating_sub(earlier.idle),
            nice: self.nice.saturating_sub(earlier.nice),
        }
    }
}

impl std::ops::Add for CoreTicks {
    type Output = CoreTicks;

    fn add(self, rhs: CoreTicks) -> CoreTicks {
        CoreTicks {
            user: self.user.saturating_add(rhs.user),
            system: self.system.saturating_add(rhs.system),
            idle: self.idle.saturating_add(rhs.idle),
            nice: self.nice.saturating_add(rhs.nice),
        }
    }
}

/// Tick counters for every core, captured at one instant
#[derive(Debug, Clone)]
pub struct ProcessorSample {
    /// Per-core counters, indexed by logical core number
    pub cores: Vec<CoreTicks>,
    /// Capture time
    pub captured_at: Instant,
}

impl ProcessorSample {
    /// Create a sample stamped with the current instant
    pub fn new(cores: Vec<CoreTicks>) -> Self {
        Self {
            cores,
            captured_at: Instant::now(),
        }
    }

    /// Number of cores in the sample
    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    /// Counters summed across all cores
    pub fn aggregate(&self) -> CoreTicks {
        self.cores
            .iter()
            .fold(CoreTicks::default(), |acc, core| acc + *core)
    }
}

/// Share of elapsed ticks spent in each state, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreUsage {
    /// User mode percentage
    pub user: f64,
    /// System mode percentage
    pub system: f64,
    /// Idle percentage
    pub idle: f64,
    /// Nice mode percentage
    pub nice: f64,
}

impl CoreUsage {
    /// Convert a tick delta into percentages. A zero total reports all zeros.
    pub fn from_ticks(delta: &CoreTicks) -> Self {
        if delta.total() == 0 {
            return Self::default();
        }

        // Summed as floats so huge counters keep their proportions
        let total = delta.user as f64 + delta.system as f64 + delta.idle as f64 + delta.nice as f64;
        Self {
            user: delta.user as f64 / total * 100.0,
            system: delta.system as f64 / total * 100.0,
            idle: delta.idle as f64 / total * 100.0,
            nice: delta.nice as f64 / total * 100.0,
        }
    }

    /// Non-idle percentage
    pub fn busy(&self) -> f64 {
        self.user + self.system + self.nice
    }

    /// Sum of all four states (100 for any non-empty interval, 0 otherwise)
    pub fn sum(&self) -> f64 {
        self.busy() + self.idle
    }
}

/// Percentages derived from two processor samples
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDelta {
    /// Per-core breakdown
    pub cores: Vec<CoreUsage>,
    /// Breakdown of the aggregate tick counters
    pub aggregate: CoreUsage,
    /// Aggregate ticks elapsed between the two samples
    pub elapsed_ticks: u64,
}

impl SampleDelta {
    /// Whole-system usage: `100 - idle%` of the aggregate counters.
    ///
    /// An interval with no elapsed ticks reports 0.
    pub fn total_usage(&self) -> f64 {
        if self.elapsed_ticks == 0 {
            return 0.0;
        }
        (100.0 - self.aggregate.idle).clamp(0.0, 100.0)
    }

    /// Per-core busy percentages
    pub fn per_core_usage(&self) -> Vec<f64> {
        self.cores.iter().map(CoreUsage::busy).collect()
    }
}

/// Frequencies reported by the platform, in MHz. Zero means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyInfo {
    /// Performance core frequency
    pub perf_mhz: u64,
    /// Efficiency core frequency
    pub effi_mhz: u64,
    /// Generic base frequency
    pub base_mhz: u64,
}

/// Core counts by class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreTopology {
    /// Number of cores reported by the platform
    pub physical: usize,
    /// Performance cores (0 on homogeneous CPUs)
    pub performance: usize,
    /// Efficiency cores (0 on homogeneous CPUs)
    pub efficiency: usize,
}

impl CoreTopology {
    /// Homogeneous CPU with `physical` cores
    pub fn uniform(physical: usize) -> Self {
        Self {
            physical,
            performance: 0,
            efficiency: 0,
        }
    }

    /// True when the platform distinguishes performance and efficiency cores
    pub fn is_heterogeneous(&self) -> bool {
        self.performance + self.efficiency > 0
    }
}

/// Static CPU platform information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuPlatform {
    /// Whether the CPU has distinct performance and efficiency cores
    pub is_heterogeneous: bool,
    /// CPU model name
    pub brand_string: String,
    /// Resolved frequency in MHz (0 = unknown)
    pub frequency_mhz: u64,
    /// Performance core frequency in MHz
    pub perf_frequency_mhz: u64,
    /// Efficiency core frequency in MHz
    pub effi_frequency_mhz: u64,
    /// Performance core count
    pub performance_cores: usize,
    /// Efficiency core count
    pub efficiency_cores: usize,
}

/// Point-in-time CPU statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    /// Whole-system usage percentage
    pub total_usage: f64,
    /// Per-core usage percentages; length equals `physical_cores`
    pub per_core_usage: Vec<f64>,
    /// Aggregate user percentage
    pub user: f64,
    /// Aggregate system percentage
    pub system: f64,
    /// Aggregate idle percentage
    pub idle: f64,
    /// Aggregate nice percentage
    pub nice: f64,
    /// Resolved frequency in MHz; 0 means not available, not a stopped CPU
    pub frequency_mhz: u64,
    /// Performance core frequency in MHz
    pub perf_frequency_mhz: u64,
    /// Efficiency core frequency in MHz
    pub effi_frequency_mhz: u64,
    /// Number of cores
    pub physical_cores: usize,
    /// Performance cores (0 when the platform has no core classes)
    pub performance_cores: usize,
    /// Efficiency cores (0 when the platform has no core classes)
    pub efficiency_cores: usize,
    /// 1, 5 and 15 minute load averages
    pub load_avg: [f64; 3],
    /// When the snapshot was finalized
    pub timestamp: DateTime<Utc>,
}
