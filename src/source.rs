//! Sample source boundary
//!
//! Platform bindings implement these traits; providers own one source each
//! and release it on shutdown. Every method is expected to be cheap and safe
//! to call repeatedly. Failures are transient from the caller's point of view
//! and are never retried here.

use crate::core::cpu::{CoreTopology, FrequencyInfo, ProcessorSample};
use crate::core::power::PowerReading;
use crate::error::Result;

/// Produces per-core tick counters and static CPU information
pub trait ProcessorSource: Send {
    /// Read the current tick counters of every core
    fn read_processor_sample(&mut self) -> Result<ProcessorSample>;

    /// Read the 1, 5 and 15 minute load averages
    fn read_load_average(&mut self) -> Result<[f64; 3]>;

    /// Read core class frequencies. Unknown values are zero, never an error.
    fn read_frequency_info(&mut self) -> FrequencyInfo;

    /// Read the core count and, where supported, the P/E split
    fn read_core_topology(&mut self) -> Result<CoreTopology>;

    /// CPU model name, if the platform exposes one
    fn read_brand_string(&mut self) -> Option<String> {
        None
    }

    /// Release any underlying hardware handle
    fn close(&mut self) {}
}

/// Produces raw battery / AC readings
pub trait BatterySource: Send {
    /// Read the current power source state
    fn read_power_reading(&mut self) -> Result<PowerReading>;

    /// Release any underlying hardware handle
    fn close(&mut self) {}
}
