//! Platform-specific sample sources

#[cfg(target_os = "linux")]
pub mod linux;

// Common utilities
pub mod common;

use crate::config::SourceConfig;
use crate::error::Result;
use crate::source::{BatterySource, ProcessorSource};

/// Processor source for the current platform
#[cfg(target_os = "linux")]
pub fn default_processor_source(config: &SourceConfig) -> Result<Box<dyn ProcessorSource>> {
    Ok(Box::new(linux::LinuxProcessorSource::new(config)?))
}

/// Processor source for the current platform
#[cfg(not(target_os = "linux"))]
pub fn default_processor_source(_config: &SourceConfig) -> Result<Box<dyn ProcessorSource>> {
    Err(unsupported())
}

/// Battery source for the current platform
#[cfg(target_os = "linux")]
pub fn default_battery_source(config: &SourceConfig) -> Result<Box<dyn BatterySource>> {
    Ok(Box::new(linux::LinuxBatterySource::new(config)))
}

/// Battery source for the current platform
#[cfg(not(target_os = "linux"))]
pub fn default_battery_source(_config: &SourceConfig) -> Result<Box<dyn BatterySource>> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> crate::error::MetricsError {
    crate::error::MetricsError::UnsupportedPlatform(format!(
        "no built-in sample source for {}; use a custom source",
        std::env::consts::OS
    ))
}
