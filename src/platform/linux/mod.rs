//! Linux platform implementation

pub mod cpu;
pub mod power;

pub use cpu::LinuxProcessorSource;
pub use power::LinuxBatterySource;
