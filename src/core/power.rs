//! Power source and battery types

use crate::error::{MetricsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the system is drawing power from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerSource {
    /// AC adapter / mains power
    Ac,
    /// Internal battery
    Battery,
    /// Could not be determined
    Unknown,
}

impl std::fmt::Display for PowerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerSource::Ac => write!(f, "AC"),
            PowerSource::Battery => write!(f, "Battery"),
            PowerSource::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Battery charging state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryState {
    /// Fully charged
    Charged,
    /// Charging
    Charging,
    /// On AC but not charging and not full (e.g. charge limit reached)
    NotCharging,
    /// Running on battery
    Discharging,
    /// No battery present
    Unknown,
}

impl std::fmt::Display for BatteryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatteryState::Charged => write!(f, "Charged"),
            BatteryState::Charging => write!(f, "Charging"),
            BatteryState::NotCharging => write!(f, "Not Charging"),
            BatteryState::Discharging => write!(f, "Discharging"),
            BatteryState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Battery wear classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryHealth {
    /// Full charge capacity at or above 80% of design
    Good,
    /// Between 50% and 80% of design
    Fair,
    /// Below 50% of design
    Poor,
    /// Capacities unavailable or no battery
    Unknown,
}

impl std::fmt::Display for BatteryHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatteryHealth::Good => write!(f, "Good"),
            BatteryHealth::Fair => write!(f, "Fair"),
            BatteryHealth::Poor => write!(f, "Poor"),
            BatteryHealth::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Raw power source fields as reported by the platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerReading {
    /// Battery installed
    pub is_present: bool,
    /// Battery is charging
    pub is_charging: bool,
    /// Battery is fully charged
    pub is_charged: bool,
    /// AC adapter connected
    pub is_ac_present: bool,
    /// State of charge (0-100)
    pub percentage: f64,
    /// Current charge, in the unit the platform reports
    pub current_capacity: f64,
    /// Full charge capacity, same unit as `design_capacity`
    pub max_capacity: f64,
    /// Original rated capacity
    pub design_capacity: f64,
    /// Charge cycles
    pub cycle_count: u32,
    /// Minutes to empty as reported; non-positive while charging
    pub time_remaining_min: i64,
    /// Minutes to full as reported
    pub time_to_full_min: i64,
    /// Battery temperature in Celsius
    pub temperature_c: Option<f64>,
    /// Battery voltage in volts
    pub voltage_v: Option<f64>,
    /// Battery current in amps
    pub amperage_a: Option<f64>,
    /// Battery power draw in watts
    pub battery_power_w: Option<f64>,
    /// CPU package power in watts
    pub cpu_power_w: Option<f64>,
    /// GPU power in watts
    pub gpu_power_w: Option<f64>,
}

/// Classified view of one power reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSnapshot {
    /// Current power source
    pub source: PowerSource,
    /// Charging state
    pub state: BatteryState,
    /// Wear classification
    pub health: BatteryHealth,
    /// Battery installed
    pub is_present: bool,
    /// State of charge (0-100)
    pub percentage: f64,
    /// Minutes to empty as reported. While charging a non-positive value
    /// means the estimate lives in `time_to_full_min`.
    pub time_remaining_min: i64,
    /// Minutes to full as reported
    pub time_to_full_min: i64,
    /// Charge cycles
    pub cycle_count: u32,
    /// Current charge
    pub current_capacity: f64,
    /// Full charge capacity
    pub max_capacity: f64,
    /// Design capacity
    pub design_capacity: f64,
    /// CPU power in watts
    pub cpu_power: Option<f64>,
    /// GPU power in watts
    pub gpu_power: Option<f64>,
    /// Total system power in watts
    pub total_power: Option<f64>,
    /// When the snapshot was finalized
    pub timestamp: DateTime<Utc>,
}

impl PowerSnapshot {
    /// Reported time remaining as a signed duration.
    ///
    /// Fails with `HardwareAccess` when the reported minutes do not fit a duration.
    pub fn time_remaining(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_minutes(self.time_remaining_min).ok_or_else(|| {
            MetricsError::HardwareAccess(format!(
                "time remaining out of range: {} minutes",
                self.time_remaining_min
            ))
        })
    }

    /// Whether the battery is charging
    pub fn is_charging(&self) -> bool {
        self.state == BatteryState::Charging
    }
}
