//! Combined CPU and power monitoring

use crate::config::Config;
use crate::core::cpu::CpuSnapshot;
use crate::core::power::PowerSnapshot;
use crate::error::{MetricsError, Result};
use crate::provider::{CpuProvider, PowerProvider};
use crate::watch::{self, CancellationToken, SnapshotStream, Timestamped};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// CPU and power snapshots taken together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// CPU statistics
    pub cpu: CpuSnapshot,
    /// Power statistics
    pub power: PowerSnapshot,
    /// When both halves were collected
    pub timestamp: DateTime<Utc>,
}

impl SystemSnapshot {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Timestamped for SystemSnapshot {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }
}

/// Main dmetrics interface: one CPU provider and one power provider
pub struct Monitor {
    cpu: CpuProvider,
    power: PowerProvider,
}

impl Monitor {
    /// Create a monitor for this platform with default settings
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dmetrics::Monitor;
    ///
    /// let monitor = Monitor::new().unwrap();
    /// let snapshot = monitor.snapshot().unwrap();
    /// println!("{}", snapshot.to_json().unwrap());
    /// ```
    pub fn new() -> Result<Self> {
        Self::with_config(&Config::default())
    }

    /// Create a monitor for this platform
    pub fn with_config(config: &Config) -> Result<Self> {
        Ok(Self::with_providers(
            CpuProvider::with_config(config)?,
            PowerProvider::with_config(config)?,
        ))
    }

    /// Combine existing providers
    pub fn with_providers(cpu: CpuProvider, power: PowerProvider) -> Self {
        Self { cpu, power }
    }

    /// CPU provider
    pub fn cpu(&self) -> &CpuProvider {
        &self.cpu
    }

    /// Power provider
    pub fn power(&self) -> &PowerProvider {
        &self.power
    }

    /// Current snapshot of both providers
    pub fn snapshot(&self) -> Result<SystemSnapshot> {
        let cpu = self.cpu.get_stats()?;
        let power = self.power.get_stats()?;
        Ok(SystemSnapshot {
            cpu,
            power,
            timestamp: Utc::now(),
        })
    }

    /// Stream combined snapshots; same policy as [`CpuProvider::watch`]
    pub fn watch(
        &self,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<SnapshotStream<SystemSnapshot>> {
        if self.cpu.is_shut_down() || self.power.is_shut_down() {
            return Err(MetricsError::Shutdown);
        }

        let cpu = self.cpu.snapshot_fn();
        let power = self.power.snapshot_fn();
        watch::spawn_session(interval, cancel, move || {
            Ok(SystemSnapshot {
                cpu: cpu()?,
                power: power()?,
                timestamp: Utc::now(),
            })
        })
    }

    /// Shut down both providers. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        self.cpu.shutdown()?;
        self.power.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingConfig;
    use crate::core::power::PowerSource;
    use crate::provider::mock::{MockBattery, MockProcessor};

    fn monitor() -> Monitor {
        let (cpu, _) = MockProcessor::new(4);
        let (power, _) = MockBattery::new(MockBattery::laptop());
        Monitor::with_providers(
            CpuProvider::with_source_and_config(cpu, &SamplingConfig { bootstrap_delay_ms: 1 }),
            PowerProvider::with_source(power),
        )
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let monitor = monitor();
        let snapshot = monitor.snapshot().unwrap();
        assert_eq!(snapshot.cpu.physical_cores, 4);
        assert_eq!(snapshot.power.source, PowerSource::Battery);

        let json = snapshot.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["cpu"]["physical_cores"], 4);
        assert_eq!(value["power"]["source"], "Battery");

        let parsed: SystemSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.timestamp, snapshot.timestamp);
        assert_eq!(parsed.cpu.load_avg, snapshot.cpu.load_avg);
    }

    #[test]
    fn test_shutdown_covers_both_providers() {
        let monitor = monitor();
        monitor.shutdown().unwrap();
        monitor.shutdown().unwrap();
        assert!(monitor.cpu().is_shut_down());
        assert!(monitor.power().is_shut_down());
        assert!(matches!(monitor.snapshot(), Err(MetricsError::Shutdown)));
        assert!(matches!(
            monitor.watch(Duration::from_millis(10), &CancellationToken::new()),
            Err(MetricsError::Shutdown)
        ));
    }

    #[tokio::test]
    async fn test_combined_watch() {
        let monitor = monitor();
        let cancel = CancellationToken::new();
        let mut stream = monitor.watch(Duration::from_millis(10), &cancel).unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(1), stream.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.cpu.per_core_usage.len(), 4);
        assert!(snapshot.power.is_present);

        cancel.cancel();
        let end = tokio::time::timeout(Duration::from_secs(1), async {
            while stream.recv().await.is_some() {}
        })
        .await;
        assert!(end.is_ok());
    }
}
