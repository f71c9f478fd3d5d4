//! # dmetrics
//!
//! Hardware metrics sampling for CPU usage and battery / power state. dmetrics turns the
//! monotonically increasing tick counters of every core into usage percentages, classifies
//! raw power-supply readings, and delivers both as one-shot snapshots or as a periodic stream.
//!
//! ## Features
//!
//! - **Delta engine**: per-core and whole-system usage from two tick samples, with an
//!   automatic warm-up on the first read
//! - **Drop-oldest streaming**: `watch` never blocks the sampler; a slow consumer only ever
//!   sees the newest snapshot
//! - **Battery classification**: charging state, power source and wear health from design
//!   capacity
//! - **Pluggable sources**: providers accept any [`ProcessorSource`] / [`BatterySource`];
//!   Linux sources (procfs / sysfs) are built in
//!
//! ## Quick Start
//!
//! ```no_run
//! use dmetrics::{CpuProvider, PowerProvider};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cpu = CpuProvider::new()?;
//! let stats = cpu.get_stats()?;
//! println!("CPU: {:.1}% ({} cores, {} MHz)",
//!     stats.total_usage, stats.physical_cores, stats.frequency_mhz);
//!
//! let power = PowerProvider::new()?;
//! match power.get_battery_percentage() {
//!     Ok(pct) => println!("Battery: {:.0}%", pct),
//!     Err(dmetrics::MetricsError::NoBattery) => println!("No battery"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Streaming
//!
//! ```no_run
//! use dmetrics::{CancellationToken, CpuProvider};
//! use std::time::Duration;
//!
//! # async fn run() -> dmetrics::Result<()> {
//! let cpu = CpuProvider::new()?;
//! let cancel = CancellationToken::new();
//! let mut stream = cpu.watch(Duration::from_millis(500), &cancel)?;
//!
//! while let Some(stats) = stream.recv().await {
//!     println!("{:.1}%", stats.total_usage);
//!     if stats.total_usage > 90.0 {
//!         cancel.cancel();
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! | Platform | CPU | Battery |
//! |----------|-----|---------|
//! | Linux    | ✅  | ✅      |
//! | Other    | custom source | custom source |

pub mod config; // Configuration management with TOML persistence
pub mod core;
pub mod delta; // Tick sample diffing
pub mod error;
pub mod platform;
pub mod provider;
pub mod snapshot; // Snapshot assembly and power classification
pub mod source; // Sample source traits
pub mod stats;
pub mod watch; // Periodic snapshot streams

// Re-export main types
pub use config::Config;
pub use crate::core::{
    cpu::{CpuPlatform, CpuSnapshot},
    power::{BatteryHealth, BatteryState, PowerReading, PowerSnapshot, PowerSource},
};
pub use error::{MetricsError, Result};
pub use provider::{CpuProvider, PowerProvider};
pub use source::{BatterySource, ProcessorSource};
pub use stats::{Monitor, SystemSnapshot};
pub use watch::{CancellationToken, SnapshotStream, TryRecvError, WatchStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
