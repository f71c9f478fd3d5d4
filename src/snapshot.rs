//! Snapshot builder
//!
//! Assembles public snapshots from delta-engine output plus static and
//! classified data. Everything here is pure; the providers decide when to
//! sample and hold the locks.

use crate::core::cpu::{CoreTopology, CpuSnapshot, FrequencyInfo, SampleDelta};
use crate::core::power::{BatteryHealth, BatteryState, PowerReading, PowerSnapshot, PowerSource};
use chrono::Utc;

/// Health at or above this percentage of design capacity is `Good`
pub const HEALTH_GOOD_THRESHOLD: f64 = 80.0;

/// Health at or above this percentage of design capacity is `Fair`
pub const HEALTH_FAIR_THRESHOLD: f64 = 50.0;

/// Pick the reported frequency: performance cores, then efficiency cores,
/// then the generic base frequency. 0 means none is known.
pub fn resolve_frequency(freq: &FrequencyInfo) -> u64 {
    [freq.perf_mhz, freq.effi_mhz, freq.base_mhz]
        .into_iter()
        .find(|&mhz| mhz > 0)
        .unwrap_or(0)
}

/// Build a CPU snapshot, stamped now.
///
/// The core count always follows the delta so that `per_core_usage.len()`
/// equals `physical_cores`. P/E counts are only kept when they add up to
/// that count.
pub fn assemble_cpu_snapshot(
    delta: &SampleDelta,
    freq: FrequencyInfo,
    topology: CoreTopology,
    load_avg: [f64; 3],
) -> CpuSnapshot {
    let per_core_usage = delta.per_core_usage();
    let physical_cores = per_core_usage.len();

    let (performance_cores, efficiency_cores) =
        if topology.is_heterogeneous() && topology.performance + topology.efficiency == physical_cores
        {
            (topology.performance, topology.efficiency)
        } else {
            (0, 0)
        };

    CpuSnapshot {
        total_usage: delta.total_usage(),
        per_core_usage,
        user: delta.aggregate.user,
        system: delta.aggregate.system,
        idle: delta.aggregate.idle,
        nice: delta.aggregate.nice,
        frequency_mhz: resolve_frequency(&freq),
        perf_frequency_mhz: freq.perf_mhz,
        effi_frequency_mhz: freq.effi_mhz,
        physical_cores,
        performance_cores,
        efficiency_cores,
        load_avg,
        timestamp: Utc::now(),
    }
}

/// Charging state, by priority: charged > charging > not charging (on AC) > discharging.
/// No battery is `Unknown`.
pub fn classify_state(reading: &PowerReading) -> BatteryState {
    if !reading.is_present {
        BatteryState::Unknown
    } else if reading.is_charged {
        BatteryState::Charged
    } else if reading.is_charging {
        BatteryState::Charging
    } else if reading.is_ac_present {
        BatteryState::NotCharging
    } else {
        BatteryState::Discharging
    }
}

/// AC whenever an adapter is connected, battery when only a battery is present
pub fn classify_source(reading: &PowerReading) -> PowerSource {
    if reading.is_ac_present {
        PowerSource::Ac
    } else if reading.is_present {
        PowerSource::Battery
    } else {
        PowerSource::Unknown
    }
}

/// Full charge capacity as a percentage of design capacity.
///
/// `None` when there is no battery or either capacity is not strictly positive.
pub fn health_percent(reading: &PowerReading) -> Option<f64> {
    if !reading.is_present || reading.max_capacity <= 0.0 || reading.design_capacity <= 0.0 {
        return None;
    }
    Some(reading.max_capacity / reading.design_capacity * 100.0)
}

/// Wear classification. Never derived from state of charge.
pub fn classify_health(reading: &PowerReading) -> BatteryHealth {
    match health_percent(reading) {
        Some(pct) if pct >= HEALTH_GOOD_THRESHOLD => BatteryHealth::Good,
        Some(pct) if pct >= HEALTH_FAIR_THRESHOLD => BatteryHealth::Fair,
        Some(_) => BatteryHealth::Poor,
        None => BatteryHealth::Unknown,
    }
}

/// Build a power snapshot, stamped now
pub fn build_power_snapshot(reading: &PowerReading) -> PowerSnapshot {
    let total_power = match (reading.cpu_power_w, reading.gpu_power_w) {
        (None, None) => reading.battery_power_w,
        (cpu, gpu) => Some(cpu.unwrap_or(0.0) + gpu.unwrap_or(0.0)),
    };

    PowerSnapshot {
        source: classify_source(reading),
        state: classify_state(reading),
        health: classify_health(reading),
        is_present: reading.is_present,
        percentage: reading.percentage,
        time_remaining_min: reading.time_remaining_min,
        time_to_full_min: reading.time_to_full_min,
        cycle_count: reading.cycle_count,
        current_capacity: reading.current_capacity,
        max_capacity: reading.max_capacity,
        design_capacity: reading.design_capacity,
        cpu_power: reading.cpu_power_w,
        gpu_power: reading.gpu_power_w,
        total_power,
        timestamp: Utc::now(),
    }
}
