//! CPU metrics provider

use super::lock;
use crate::config::{Config, SamplingConfig};
use crate::core::cpu::{CoreTopology, CpuPlatform, CpuSnapshot, FrequencyInfo, SampleDelta};
use crate::delta::{DeltaEngine, DeltaOutcome};
use crate::error::{MetricsError, Result};
use crate::platform;
use crate::snapshot::{assemble_cpu_snapshot, resolve_frequency};
use crate::source::ProcessorSource;
use crate::watch::{self, CancellationToken, SnapshotStream};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source and delta state, guarded together by one lock
struct CpuState {
    source: Option<Box<dyn ProcessorSource>>,
    engine: DeltaEngine,
}

struct CpuInner {
    state: Mutex<CpuState>,
    shut_down: AtomicBool,
    bootstrap_delay: Duration,
}

/// CPU usage, frequency and topology provider.
///
/// All accessors are synchronous and may be called concurrently. The first
/// usage read after construction blocks for the bootstrap delay
/// (`sampling.bootstrap_delay_ms`) so it has two samples to compare.
///
/// # Example
///
/// ```no_run
/// use dmetrics::CpuProvider;
///
/// let cpu = CpuProvider::new().unwrap();
/// let stats = cpu.get_stats().unwrap();
/// println!("CPU usage: {:.1}% over {} cores", stats.total_usage, stats.physical_cores);
/// cpu.shutdown().unwrap();
/// ```
pub struct CpuProvider {
    inner: Arc<CpuInner>,
}

impl CpuProvider {
    /// Create a provider for this platform with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(&Config::default())
    }

    /// Create a provider for this platform
    pub fn with_config(config: &Config) -> Result<Self> {
        let source = platform::default_processor_source(&config.source)?;
        Ok(Self::from_boxed(source, &config.sampling))
    }

    /// Create a provider around a custom sample source with default sampling settings
    pub fn with_source<S: ProcessorSource + 'static>(source: S) -> Self {
        Self::with_source_and_config(source, &SamplingConfig::default())
    }

    /// Create a provider around a custom sample source
    pub fn with_source_and_config<S: ProcessorSource + 'static>(
        source: S,
        sampling: &SamplingConfig,
    ) -> Self {
        Self::from_boxed(Box::new(source), sampling)
    }

    fn from_boxed(source: Box<dyn ProcessorSource>, sampling: &SamplingConfig) -> Self {
        Self {
            inner: Arc::new(CpuInner {
                state: Mutex::new(CpuState {
                    source: Some(source),
                    engine: DeltaEngine::new(),
                }),
                shut_down: AtomicBool::new(false),
                bootstrap_delay: sampling.bootstrap_delay(),
            }),
        }
    }

    /// Full CPU snapshot
    pub fn get_stats(&self) -> Result<CpuSnapshot> {
        self.inner.build_snapshot()
    }

    /// Whole-system usage percentage (0-100)
    pub fn get_usage(&self) -> Result<f64> {
        Ok(self.inner.build_snapshot()?.total_usage)
    }

    /// Resolved CPU frequency in MHz.
    ///
    /// Prefers the performance-core frequency, then efficiency cores, then the
    /// base frequency. Fails with `HardwareAccess` when none is known.
    pub fn get_frequency(&self) -> Result<u64> {
        match resolve_frequency(&self.inner.frequency_info()?) {
            0 => Err(MetricsError::HardwareAccess(
                "failed to detect CPU frequency".to_string(),
            )),
            mhz => Ok(mhz),
        }
    }

    /// Performance-core frequency in MHz
    pub fn get_performance_frequency(&self) -> Result<u64> {
        match self.inner.frequency_info()?.perf_mhz {
            0 => Err(MetricsError::UnsupportedPlatform(
                "performance core frequency not available".to_string(),
            )),
            mhz => Ok(mhz),
        }
    }

    /// Efficiency-core frequency in MHz
    pub fn get_efficiency_frequency(&self) -> Result<u64> {
        match self.inner.frequency_info()?.effi_mhz {
            0 => Err(MetricsError::UnsupportedPlatform(
                "efficiency core frequency not available".to_string(),
            )),
            mhz => Ok(mhz),
        }
    }

    /// Number of cores
    pub fn get_core_count(&self) -> Result<usize> {
        Ok(self.inner.topology()?.physical)
    }

    /// Number of performance cores on heterogeneous CPUs
    pub fn get_performance_core_count(&self) -> Result<usize> {
        Ok(self.inner.heterogeneous_topology()?.performance)
    }

    /// Number of efficiency cores on heterogeneous CPUs
    pub fn get_efficiency_core_count(&self) -> Result<usize> {
        Ok(self.inner.heterogeneous_topology()?.efficiency)
    }

    /// 1, 5 and 15 minute load averages
    pub fn get_load_average(&self) -> Result<[f64; 3]> {
        self.inner.with_source(|source| source.read_load_average())
    }

    /// Static platform information
    pub fn get_platform(&self) -> Result<CpuPlatform> {
        self.inner.with_source(|source| {
            let freq = source.read_frequency_info();
            let topology = source.read_core_topology()?;
            Ok(CpuPlatform {
                is_heterogeneous: topology.is_heterogeneous(),
                brand_string: source
                    .read_brand_string()
                    .unwrap_or_else(|| "Unknown".to_string()),
                frequency_mhz: resolve_frequency(&freq),
                perf_frequency_mhz: freq.perf_mhz,
                effi_frequency_mhz: freq.effi_mhz,
                performance_cores: topology.performance,
                efficiency_cores: topology.efficiency,
            })
        })
    }

    /// Stream a snapshot every `interval` until `cancel` fires or the provider shuts down.
    ///
    /// Must be called from within a tokio runtime. The first snapshot arrives
    /// after one interval. Run at most one session per provider: concurrent
    /// sessions share the provider's previous sample.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dmetrics::{CancellationToken, CpuProvider};
    /// use std::time::Duration;
    ///
    /// # async fn run() -> dmetrics::Result<()> {
    /// let cpu = CpuProvider::new()?;
    /// let cancel = CancellationToken::new();
    /// let mut stream = cpu.watch(Duration::from_secs(1), &cancel)?;
    /// while let Some(stats) = stream.recv().await {
    ///     println!("{:.1}%", stats.total_usage);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn watch(
        &self,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<SnapshotStream<CpuSnapshot>> {
        self.inner.ensure_running()?;
        watch::spawn_session(interval, cancel, self.snapshot_fn())
    }

    /// Snapshot builder that outlives `&self`, for watch sessions
    pub(crate) fn snapshot_fn(&self) -> impl Fn() -> Result<CpuSnapshot> + Send + Sync + 'static {
        let inner = Arc::clone(&self.inner);
        move || inner.build_snapshot()
    }

    /// Release the sample source. Idempotent.
    ///
    /// Every later call fails with `MetricsError::Shutdown`, and running watch
    /// sessions end on their next tick.
    pub fn shutdown(&self) -> Result<()> {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut state = lock(&self.inner.state);
        if let Some(mut source) = state.source.take() {
            source.close();
        }
        state.engine.reset();
        debug!("CPU provider shut down");
        Ok(())
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }
}

impl CpuInner {
    fn ensure_running(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(MetricsError::Shutdown);
        }
        Ok(())
    }

    /// Run `f` against the source under the provider lock.
    /// Raw source failures come back as `HardwareAccess`.
    fn with_source<R>(
        &self,
        f: impl FnOnce(&mut dyn ProcessorSource) -> Result<R>,
    ) -> Result<R> {
        self.ensure_running()?;
        let mut state = lock(&self.state);
        let source = state.source.as_mut().ok_or(MetricsError::Shutdown)?;
        f(source.as_mut()).map_err(MetricsError::into_hardware_access)
    }

    /// Read one sample and diff it against the stored one.
    ///
    /// A failed read leaves the stored sample untouched.
    fn advance(&self) -> Result<DeltaOutcome> {
        self.ensure_running()?;
        let mut state = lock(&self.state);
        let CpuState { source, engine } = &mut *state;
        let source = source.as_mut().ok_or(MetricsError::Shutdown)?;
        let sample = source
            .read_processor_sample()
            .map_err(MetricsError::into_hardware_access)?;
        Ok(engine.advance(sample))
    }

    /// Delta against the previous sample, bootstrapping with one bounded retry
    fn sample_delta(&self) -> Result<SampleDelta> {
        if let DeltaOutcome::Ready(delta) = self.advance()? {
            return Ok(delta);
        }

        // Lock is not held across the warm-up sleep
        debug!(
            "bootstrap sample stored, retrying after {:?}",
            self.bootstrap_delay
        );
        std::thread::sleep(self.bootstrap_delay);

        match self.advance()? {
            DeltaOutcome::Ready(delta) => Ok(delta),
            DeltaOutcome::BootstrapNeeded => Err(MetricsError::HardwareAccess(
                "processor sample still bootstrapping after warm-up".to_string(),
            )),
        }
    }

    fn build_snapshot(&self) -> Result<CpuSnapshot> {
        let delta = self.sample_delta()?;
        self.with_source(|source| {
            let load_avg = source.read_load_average()?;
            let freq = source.read_frequency_info();
            let topology = source.read_core_topology().unwrap_or_else(|e| {
                debug!("core topology unavailable, reporting uniform cores: {}", e);
                CoreTopology::uniform(delta.cores.len())
            });
            Ok(assemble_cpu_snapshot(&delta, freq, topology, load_avg))
        })
    }

    fn frequency_info(&self) -> Result<FrequencyInfo> {
        self.with_source(|source| Ok(source.read_frequency_info()))
    }

    fn topology(&self) -> Result<CoreTopology> {
        self.with_source(|source| source.read_core_topology())
    }

    fn heterogeneous_topology(&self) -> Result<CoreTopology> {
        let topology = self.topology()?;
        if !topology.is_heterogeneous() {
            return Err(MetricsError::UnsupportedPlatform(
                "CPU does not distinguish performance and efficiency cores".to_string(),
            ));
        }
        Ok(topology)
    }
}

impl Drop for CpuInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(mut source) = state.source.take() {
            source.close();
        }
    }
}
