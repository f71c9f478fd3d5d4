//! Linux processor source
//!
//! Tick counters come from `/proc/stat`, load averages from `/proc/loadavg`,
//! frequencies from cpufreq and hybrid core classes from the `cpu_core` /
//! `cpu_atom` PMU devices that Intel hybrid parts expose in sysfs.

use crate::config::SourceConfig;
use crate::core::cpu::{CoreTicks, CoreTopology, FrequencyInfo, ProcessorSample};
use crate::error::{MetricsError, Result};
use crate::platform::common::*;
use crate::source::ProcessorSource;
use std::fs;
use std::path::PathBuf;

/// Reads processor counters from procfs and sysfs
#[derive(Debug, Clone)]
pub struct LinuxProcessorSource {
    proc_root: PathBuf,
    sys_root: PathBuf,
    brand: Option<String>,
}

impl LinuxProcessorSource {
    /// Create a source rooted at the configured procfs / sysfs mounts
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let stat = config.proc_root.join("stat");
        if !stat.exists() {
            return Err(MetricsError::HardwareAccess(format!(
                "{} not found",
                stat.display()
            )));
        }

        // Model name never changes, read it once
        let brand = fs::read_to_string(config.proc_root.join("cpuinfo"))
            .ok()
            .and_then(|content| parse_cpu_model(&content));

        Ok(Self {
            proc_root: config.proc_root.clone(),
            sys_root: config.sys_root.clone(),
            brand,
        })
    }

    fn cpu_dir(&self) -> PathBuf {
        self.sys_root.join("devices/system/cpu")
    }

    fn read_cpu_class(&self, class: &str) -> Vec<usize> {
        fs::read_to_string(self.sys_root.join("devices").join(class).join("cpus"))
            .ok()
            .and_then(|list| parse_cpu_list(&list))
            .unwrap_or_default()
    }

    /// `cpuinfo_max_freq` of one CPU in MHz, 0 if unavailable
    fn max_freq_mhz(&self, cpu: usize) -> u64 {
        read_file_u64(
            self.cpu_dir()
                .join(format!("cpu{}", cpu))
                .join("cpufreq/cpuinfo_max_freq"),
        )
        .map(|khz| khz / 1000)
        .unwrap_or(0)
    }

    fn class_freq_mhz(&self, cpus: &[usize]) -> u64 {
        cpus.iter().map(|&cpu| self.max_freq_mhz(cpu)).max().unwrap_or(0)
    }
}

impl ProcessorSource for LinuxProcessorSource {
    fn read_processor_sample(&mut self) -> Result<ProcessorSample> {
        let content = fs::read_to_string(self.proc_root.join("stat"))?;
        Ok(ProcessorSample::new(parse_proc_stat(&content)?))
    }

    fn read_load_average(&mut self) -> Result<[f64; 3]> {
        let content = fs::read_to_string(self.proc_root.join("loadavg"))?;
        parse_loadavg(&content)
    }

    fn read_frequency_info(&mut self) -> FrequencyInfo {
        let base_dir = self.cpu_dir().join("cpu0/cpufreq");
        let base_mhz = read_file_u64(base_dir.join("base_frequency"))
            .or_else(|_| read_file_u64(base_dir.join("cpuinfo_max_freq")))
            .map(|khz| khz / 1000)
            .unwrap_or(0);

        FrequencyInfo {
            perf_mhz: self.class_freq_mhz(&self.read_cpu_class("cpu_core")),
            effi_mhz: self.class_freq_mhz(&self.read_cpu_class("cpu_atom")),
            base_mhz,
        }
    }

    fn read_core_topology(&mut self) -> Result<CoreTopology> {
        let physical = match fs::read_to_string(self.cpu_dir().join("online")) {
            Ok(list) => parse_cpu_list(&list)
                .ok_or_else(|| MetricsError::Parse(format!("bad CPU list: {}", list.trim())))?
                .len(),
            Err(_) => self.read_processor_sample()?.core_count(),
        };

        let performance = self.read_cpu_class("cpu_core").len();
        let efficiency = self.read_cpu_class("cpu_atom").len();

        if performance > 0 && efficiency > 0 {
            Ok(CoreTopology {
                physical,
                performance,
                efficiency,
            })
        } else {
            Ok(CoreTopology::uniform(physical))
        }
    }

    fn read_brand_string(&mut self) -> Option<String> {
        self.brand.clone()
    }
}

/// Parse per-core lines of `/proc/stat`.
///
/// Kernel columns are `user nice system idle iowait irq softirq steal ...`.
/// IRQ time counts as system and I/O wait as idle; steal and guest are left out.
pub fn parse_proc_stat(content: &str) -> Result<Vec<CoreTicks>> {
    let mut cores = Vec::new();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let name = match parts.next() {
            Some(name) => name,
            None => continue,
        };
        // Skip the aggregate "cpu" line and everything that is not a core
        let is_core = name.starts_with("cpu")
            && name.len() > 3
            && name[3..].chars().all(|c| c.is_ascii_digit());
        if !is_core {
            continue;
        }

        let fields = parts
            .map(|s| s.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MetricsError::Parse(format!("Failed to parse {} ticks: {}", name, e)))?;
        if fields.len() < 4 {
            return Err(MetricsError::Parse(format!(
                "{} has {} tick columns, expected at least 4",
                name,
                fields.len()
            )));
        }

        let column = |i: usize| fields.get(i).copied().unwrap_or(0);
        cores.push(CoreTicks {
            user: column(0),
            nice: column(1),
            system: column(2) + column(5) + column(6),
            idle: column(3) + column(4),
        });
    }

    if cores.is_empty() {
        return Err(MetricsError::Parse(
            "no per-core lines in /proc/stat".to_string(),
        ));
    }

    Ok(cores)
}

/// Parse the first three fields of `/proc/loadavg`
pub fn parse_loadavg(content: &str) -> Result<[f64; 3]> {
    let mut load = [0.0; 3];
    let mut fields = content.split_whitespace();
    for slot in load.iter_mut() {
        let field = fields
            .next()
            .ok_or_else(|| MetricsError::Parse("truncated /proc/loadavg".to_string()))?;
        *slot = field
            .parse()
            .map_err(|e| MetricsError::Parse(format!("Failed to parse load average: {}", e)))?;
    }
    Ok(load)
}

fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("model name") || line.starts_with("Processor"))
        .find_map(|line| line.split_once(':').map(|(_, v)| v.trim().to_string()))
        .filter(|model| !model.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const STAT: &str = "\
cpu  400 20 300 8000 100 10 10 5 0 0
cpu0 200 10 150 4000 50 5 5 3 0 0
cpu1 200 10 150 4000 50 5 5 2 0 0
intr 123456 0 0
ctxt 987654
btime 1700000000
";

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> (tempfile::TempDir, SourceConfig) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "proc/stat", STAT);
        write(root, "proc/loadavg", "0.52 0.58 0.59 1/467 12345\n");
        write(
            root,
            "proc/cpuinfo",
            "processor\t: 0\nmodel name\t: Example CPU @ 2.40GHz\n",
        );
        write(root, "sys/devices/system/cpu/online", "0-1\n");
        write(
            root,
            "sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq",
            "3600000\n",
        );

        let config = SourceConfig {
            proc_root: root.join("proc"),
            sys_root: root.join("sys"),
        };
        (dir, config)
    }

    #[test]
    fn test_parse_proc_stat_folds_columns() {
        let cores = parse_proc_stat(STAT).unwrap();
        assert_eq!(cores.len(), 2);
        assert_eq!(
            cores[0],
            CoreTicks {
                user: 200,
                nice: 10,
                system: 160,
                idle: 4050,
            }
        );
    }

    #[test]
    fn test_parse_proc_stat_rejects_garbage() {
        assert!(matches!(
            parse_proc_stat("cpu  1 2 3 4\n"),
            Err(MetricsError::Parse(_))
        ));
        assert!(matches!(
            parse_proc_stat("cpu0 1 2\n"),
            Err(MetricsError::Parse(_))
        ));
        assert!(matches!(
            parse_proc_stat("cpu0 1 x 3 4\n"),
            Err(MetricsError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_loadavg() {
        assert_eq!(
            parse_loadavg("1.00 0.50 0.25 2/100 1\n").unwrap(),
            [1.0, 0.5, 0.25]
        );
        assert!(parse_loadavg("1.00\n").is_err());
    }

    #[test]
    fn test_source_reads_fixture_tree() {
        let (_dir, config) = fixture();
        let mut source = LinuxProcessorSource::new(&config).unwrap();

        assert_eq!(source.read_processor_sample().unwrap().core_count(), 2);
        assert_eq!(source.read_load_average().unwrap(), [0.52, 0.58, 0.59]);
        assert_eq!(
            source.read_brand_string().as_deref(),
            Some("Example CPU @ 2.40GHz")
        );

        let freq = source.read_frequency_info();
        assert_eq!(freq, FrequencyInfo {
            perf_mhz: 0,
            effi_mhz: 0,
            base_mhz: 3600,
        });
        assert_eq!(source.read_core_topology().unwrap(), CoreTopology::uniform(2));
    }

    #[test]
    fn test_hybrid_topology() {
        let (dir, config) = fixture();
        let root = dir.path();
        write(root, "sys/devices/system/cpu/online", "0-5\n");
        write(root, "sys/devices/cpu_core/cpus", "0-1\n");
        write(root, "sys/devices/cpu_atom/cpus", "2-5\n");
        write(
            root,
            "sys/devices/system/cpu/cpu0/cpufreq/base_frequency",
            "2400000\n",
        );
        write(
            root,
            "sys/devices/system/cpu/cpu2/cpufreq/cpuinfo_max_freq",
            "3000000\n",
        );

        let mut source = LinuxProcessorSource::new(&config).unwrap();
        let topology = source.read_core_topology().unwrap();
        assert_eq!(
            topology,
            CoreTopology {
                physical: 6,
                performance: 2,
                efficiency: 4,
            }
        );

        let freq = source.read_frequency_info();
        assert_eq!(freq.perf_mhz, 3600);
        assert_eq!(freq.effi_mhz, 3000);
        assert_eq!(freq.base_mhz, 2400);
    }

    #[test]
    fn test_missing_procfs_is_hardware_access() {
        let dir = tempfile::tempdir().unwrap();
        let config = SourceConfig {
            proc_root: dir.path().join("proc"),
            sys_root: dir.path().join("sys"),
        };
        assert!(LinuxProcessorSource::new(&config)
            .unwrap_err()
            .is_hardware_access());
    }
}
