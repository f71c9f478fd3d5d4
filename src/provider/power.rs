//! Power source and battery provider

use super::lock;
use crate::config::Config;
use crate::core::power::{BatteryHealth, BatteryState, PowerReading, PowerSnapshot, PowerSource};
use crate::error::{MetricsError, Result};
use crate::platform;
use crate::snapshot::build_power_snapshot;
use crate::source::BatterySource;
use crate::watch::{self, CancellationToken, SnapshotStream};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct PowerInner {
    source: Mutex<Option<Box<dyn BatterySource>>>,
    shut_down: AtomicBool,
}

/// Battery and AC adapter provider.
///
/// Power readings are stateless, so every accessor performs exactly one
/// source read. Battery-specific accessors fail with
/// `MetricsError::NoBattery` on machines without a battery.
///
/// # Example
///
/// ```no_run
/// use dmetrics::PowerProvider;
///
/// let power = PowerProvider::new().unwrap();
/// let stats = power.get_stats().unwrap();
/// println!("Power source: {}, Battery: {:.1}%", stats.source, stats.percentage);
/// ```
pub struct PowerProvider {
    inner: Arc<PowerInner>,
}

impl PowerProvider {
    /// Create a provider for this platform with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(&Config::default())
    }

    /// Create a provider for this platform
    pub fn with_config(config: &Config) -> Result<Self> {
        Ok(Self::from_boxed(platform::default_battery_source(
            &config.source,
        )?))
    }

    /// Create a provider around a custom battery source
    pub fn with_source<S: BatterySource + 'static>(source: S) -> Self {
        Self::from_boxed(Box::new(source))
    }

    fn from_boxed(source: Box<dyn BatterySource>) -> Self {
        Self {
            inner: Arc::new(PowerInner {
                source: Mutex::new(Some(source)),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Full classified power snapshot
    pub fn get_stats(&self) -> Result<PowerSnapshot> {
        self.inner.build_snapshot()
    }

    /// Current power source
    pub fn get_power_source(&self) -> Result<PowerSource> {
        Ok(self.inner.build_snapshot()?.source)
    }

    /// Whether a battery is installed
    pub fn get_battery_present(&self) -> Result<bool> {
        Ok(self.inner.read()?.is_present)
    }

    /// State of charge (0-100)
    pub fn get_battery_percentage(&self) -> Result<f64> {
        Ok(self.inner.battery_snapshot()?.percentage)
    }

    /// Charging state. `Unknown` when no battery is present.
    pub fn get_battery_state(&self) -> Result<BatteryState> {
        Ok(self.inner.build_snapshot()?.state)
    }

    /// Wear classification
    pub fn get_battery_health(&self) -> Result<BatteryHealth> {
        Ok(self.inner.battery_snapshot()?.health)
    }

    /// Time remaining as reported; see [`PowerSnapshot::time_remaining_min`]
    pub fn get_time_remaining(&self) -> Result<chrono::Duration> {
        self.inner.battery_snapshot()?.time_remaining()
    }

    /// Whether the battery is charging
    pub fn get_battery_charging(&self) -> Result<bool> {
        Ok(self.inner.battery_snapshot()?.is_charging())
    }

    /// Total power draw in watts, `None` when the platform does not report it
    pub fn get_power_consumption(&self) -> Result<Option<f64>> {
        Ok(self.inner.build_snapshot()?.total_power)
    }

    /// Stream a power snapshot every `interval`.
    ///
    /// Same delivery policy as [`CpuProvider::watch`](crate::CpuProvider::watch):
    /// capacity 1, newest snapshot wins, closed on cancel or shutdown.
    pub fn watch(
        &self,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<SnapshotStream<PowerSnapshot>> {
        self.inner.ensure_running()?;
        watch::spawn_session(interval, cancel, self.snapshot_fn())
    }

    /// Snapshot builder that outlives `&self`, for watch sessions
    pub(crate) fn snapshot_fn(&self) -> impl Fn() -> Result<PowerSnapshot> + Send + Sync + 'static {
        let inner = Arc::clone(&self.inner);
        move || inner.build_snapshot()
    }

    /// Release the battery source. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(mut source) = lock(&self.inner.source).take() {
            source.close();
        }
        debug!("power provider shut down");
        Ok(())
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }
}

impl PowerInner {
    fn ensure_running(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(MetricsError::Shutdown);
        }
        Ok(())
    }

    fn read(&self) -> Result<PowerReading> {
        self.ensure_running()?;
        let mut source = lock(&self.source);
        source
            .as_mut()
            .ok_or(MetricsError::Shutdown)?
            .read_power_reading()
            .map_err(MetricsError::into_hardware_access)
    }

    fn build_snapshot(&self) -> Result<PowerSnapshot> {
        Ok(build_power_snapshot(&self.read()?))
    }

    fn battery_snapshot(&self) -> Result<PowerSnapshot> {
        let snapshot = self.build_snapshot()?;
        if !snapshot.is_present {
            return Err(MetricsError::NoBattery);
        }
        Ok(snapshot)
    }
}

impl Drop for PowerInner {
    fn drop(&mut self) {
        let source = self.source.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(mut source) = source.take() {
            source.close();
        }
    }
}
