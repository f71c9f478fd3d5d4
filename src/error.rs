//! Error types for dmetrics

use std::io;
use thiserror::Error;

/// Result type alias for dmetrics operations
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Error type shared by every provider and sample source
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Underlying system or framework call failed
    #[error("failed to access hardware information: {0}")]
    HardwareAccess(String),

    /// I/O error from a platform source
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Platform data could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Watch interval was zero or negative
    #[error("interval must be positive")]
    InvalidInterval,

    /// Operation not available on this hardware (e.g. P/E cores on a homogeneous CPU)
    #[error("operation not supported on this platform: {0}")]
    UnsupportedPlatform(String),

    /// Battery accessor used on a system without a battery
    #[error("no battery present")]
    NoBattery,

    /// Provider has been shut down
    #[error("provider has been shut down")]
    Shutdown,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No async runtime available to drive a watch session
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Snapshot could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MetricsError {
    /// Fold raw source failures into the `HardwareAccess` kind.
    ///
    /// Errors that already carry their own meaning (no battery, shutdown,
    /// unsupported platform, ...) pass through unchanged.
    pub fn into_hardware_access(self) -> Self {
        match self {
            MetricsError::Io(e) => MetricsError::HardwareAccess(e.to_string()),
            MetricsError::Parse(s) => MetricsError::HardwareAccess(s),
            other => other,
        }
    }

    /// True for `HardwareAccess` errors
    pub fn is_hardware_access(&self) -> bool {
        matches!(self, MetricsError::HardwareAccess(_))
    }

    /// True for `Shutdown` errors
    pub fn is_shutdown(&self) -> bool {
        matches!(self, MetricsError::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_errors_fold_into_hardware_access() {
        let io = MetricsError::from(io::Error::new(io::ErrorKind::NotFound, "stat"));
        assert!(io.into_hardware_access().is_hardware_access());

        let parse = MetricsError::Parse("bad line".to_string()).into_hardware_access();
        assert!(matches!(parse, MetricsError::HardwareAccess(ref s) if s == "bad line"));
    }

    #[test]
    fn test_domain_errors_pass_through() {
        assert!(MetricsError::Shutdown.into_hardware_access().is_shutdown());
        assert!(matches!(
            MetricsError::NoBattery.into_hardware_access(),
            MetricsError::NoBattery
        ));
    }
}
