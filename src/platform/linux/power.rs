//! Linux battery source
//!
//! Reads `/sys/class/power_supply/*`. Mains and USB supplies that report
//! `online` count as external power; the first system battery (not a
//! peripheral with `scope = Device`) supplies the battery fields.

use crate::config::SourceConfig;
use crate::core::power::PowerReading;
use crate::error::Result;
use crate::platform::common::*;
use crate::source::BatterySource;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Reads power supplies from sysfs
#[derive(Debug, Clone)]
pub struct LinuxBatterySource {
    supply_root: PathBuf,
}

impl LinuxBatterySource {
    /// Create a source rooted at the configured sysfs mount
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            supply_root: config.sys_root.join("class/power_supply"),
        }
    }
}

impl BatterySource for LinuxBatterySource {
    fn read_power_reading(&mut self) -> Result<PowerReading> {
        let mut reading = PowerReading::default();

        let entries = match fs::read_dir(&self.supply_root) {
            Ok(entries) => entries,
            // No power_supply class at all: nothing to report, not a failure
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(reading),
            Err(e) => return Err(e.into()),
        };

        let mut supplies: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        supplies.sort();

        let mut battery_found = false;
        for path in supplies {
            let kind = read_file_string(path.join("type")).unwrap_or_default();
            match kind.to_lowercase().as_str() {
                "mains" | "usb" | "usb_c" | "usb_pd" => {
                    if read_optional_i64(path.join("online")) == Some(1) {
                        reading.is_ac_present = true;
                    }
                }
                "battery" if !battery_found && is_system_battery(&path) => {
                    read_battery(&path, &mut reading);
                    battery_found = true;
                }
                _ => {}
            }
        }

        Ok(reading)
    }
}

fn is_system_battery(path: &Path) -> bool {
    let scope = read_file_string(path.join("scope")).unwrap_or_default();
    if scope.eq_ignore_ascii_case("device") {
        return false;
    }
    // Drivers without a `present` attribute only register present batteries
    read_optional_i64(path.join("present")).map_or(true, |p| p == 1)
}

/// Micro-units (µWh, µAh, µW, µV, µA) to base units
fn micro(value: i64) -> f64 {
    value as f64 / 1_000_000.0
}

fn read_battery(path: &Path, reading: &mut PowerReading) {
    reading.is_present = true;

    let status = read_file_string(path.join("status")).unwrap_or_default();
    match status.to_lowercase().as_str() {
        "charging" => reading.is_charging = true,
        "full" => reading.is_charged = true,
        _ => {}
    }

    // Energy in µWh is preferred; some drivers only report charge in µAh
    let (now, full, design) = match read_optional_i64(path.join("energy_full")) {
        Some(full) => (
            read_optional_i64(path.join("energy_now")),
            Some(full),
            read_optional_i64(path.join("energy_full_design")),
        ),
        None => (
            read_optional_i64(path.join("charge_now")),
            read_optional_i64(path.join("charge_full")),
            read_optional_i64(path.join("charge_full_design")),
        ),
    };
    reading.current_capacity = now.map(micro).unwrap_or(0.0);
    reading.max_capacity = full.map(micro).unwrap_or(0.0);
    reading.design_capacity = design.map(micro).unwrap_or(0.0);

    reading.percentage = match read_optional_i64(path.join("capacity")) {
        Some(pct) => pct.clamp(0, 100) as f64,
        None if reading.max_capacity > 0.0 => {
            (reading.current_capacity / reading.max_capacity * 100.0).clamp(0.0, 100.0)
        }
        None => 0.0,
    };

    reading.cycle_count = read_optional_i64(path.join("cycle_count"))
        .and_then(|c| u32::try_from(c).ok())
        .unwrap_or(0);

    reading.voltage_v = read_optional_i64(path.join("voltage_now")).map(micro);
    reading.amperage_a = read_optional_i64(path.join("current_now")).map(|ua| micro(ua.abs()));
    reading.temperature_c = read_optional_i64(path.join("temp")).map(|t| t as f64 / 10.0);
    reading.battery_power_w = read_optional_i64(path.join("power_now"))
        .map(|uw| micro(uw.abs()))
        .or_else(|| match (reading.voltage_v, reading.amperage_a) {
            (Some(v), Some(a)) => Some(v * a),
            _ => None,
        });

    // Seconds to minutes
    reading.time_remaining_min = read_optional_i64(path.join("time_to_empty_now"))
        .map(|s| s / 60)
        .unwrap_or(0);
    reading.time_to_full_min = read_optional_i64(path.join("time_to_full_now"))
        .map(|s| s / 60)
        .unwrap_or(0);
}
