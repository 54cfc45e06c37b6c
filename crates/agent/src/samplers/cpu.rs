//! CPU usage sampler.
//!
//! On Linux the user/system/idle split comes from `/proc/stat` deltas
//! between consecutive ticks; the first tick reports boot-relative
//! averages. Other platforms fall back to sysinfo's usage percentage.

use async_trait::async_trait;
use serde::Serialize;

use super::{to_values, SampleError, Sampler};
use crate::metrics::MetricFamily;

#[derive(Debug, Serialize)]
struct CpuValues {
    user_pct: f64,
    system_pct: f64,
    idle_pct: f64,
    per_core_pct: Vec<f64>,
}

#[cfg(target_os = "linux")]
pub use linux::CpuSampler;

#[cfg(target_os = "linux")]
mod linux {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Jiffy counters for one `cpu` line of `/proc/stat`.
    #[derive(Debug, Clone, Copy, Default)]
    struct CpuTimes {
        user: u64,
        nice: u64,
        system: u64,
        idle: u64,
        iowait: u64,
        irq: u64,
        softirq: u64,
    }

    impl CpuTimes {
        fn total(&self) -> u64 {
            self.user + self.nice + self.system + self.idle + self.iowait + self.irq + self.softirq
        }

        fn user_ticks(&self) -> u64 {
            self.user + self.nice
        }

        fn system_ticks(&self) -> u64 {
            self.system + self.irq + self.softirq
        }

        fn idle_ticks(&self) -> u64 {
            self.idle + self.iowait
        }
    }

    #[derive(Debug, Default)]
    struct ProcStat {
        aggregate: CpuTimes,
        per_core: Vec<CpuTimes>,
    }

    fn parse_cpu_line(line: &str) -> Option<CpuTimes> {
        let mut fields = line.split_whitespace().skip(1);
        let mut next = || fields.next().and_then(|f| f.parse::<u64>().ok());
        Some(CpuTimes {
            user: next()?,
            nice: next()?,
            system: next()?,
            idle: next()?,
            iowait: next().unwrap_or(0),
            irq: next().unwrap_or(0),
            softirq: next().unwrap_or(0),
        })
    }

    fn read_proc_stat() -> Result<ProcStat, SampleError> {
        let content = std::fs::read_to_string("/proc/stat")
            .map_err(|e| SampleError(format!("reading /proc/stat: {e}")))?;

        let mut stat = ProcStat::default();
        let mut saw_aggregate = false;
        for line in content.lines() {
            if let Some(rest) = line.strip_prefix("cpu") {
                let times = parse_cpu_line(line)
                    .ok_or_else(|| SampleError(format!("malformed /proc/stat line: {line}")))?;
                if rest.starts_with(char::is_whitespace) {
                    stat.aggregate = times;
                    saw_aggregate = true;
                } else {
                    stat.per_core.push(times);
                }
            }
        }
        if !saw_aggregate {
            return Err(SampleError("no aggregate cpu line in /proc/stat".into()));
        }
        Ok(stat)
    }

    fn pct(part: u64, whole: u64) -> f64 {
        if whole == 0 {
            0.0
        } else {
            part as f64 / whole as f64 * 100.0
        }
    }

    fn usage_pct(prev: CpuTimes, cur: CpuTimes) -> f64 {
        let total = cur.total().saturating_sub(prev.total());
        if total == 0 {
            return 0.0;
        }
        let idle = cur.idle_ticks().saturating_sub(prev.idle_ticks());
        (100.0 - pct(idle, total)).clamp(0.0, 100.0)
    }

    /// Samples aggregate and per-core CPU percentages.
    pub struct CpuSampler {
        prev: Arc<Mutex<Option<ProcStat>>>,
    }

    impl CpuSampler {
        pub fn new() -> Self {
            Self {
                prev: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl Default for CpuSampler {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Sampler for CpuSampler {
        fn family(&self) -> MetricFamily {
            MetricFamily::Cpu
        }

        async fn sample(&self) -> Result<serde_json::Value, SampleError> {
            let prev = self.prev.clone();
            tokio::task::spawn_blocking(move || {
                let stat = read_proc_stat()?;

                let mut guard = prev
                    .lock()
                    .map_err(|_| SampleError("cpu sampler state poisoned".into()))?;
                let baseline = guard.take().unwrap_or_default();

                let d_total = stat
                    .aggregate
                    .total()
                    .saturating_sub(baseline.aggregate.total());
                let values = CpuValues {
                    user_pct: pct(
                        stat.aggregate
                            .user_ticks()
                            .saturating_sub(baseline.aggregate.user_ticks()),
                        d_total,
                    ),
                    system_pct: pct(
                        stat.aggregate
                            .system_ticks()
                            .saturating_sub(baseline.aggregate.system_ticks()),
                        d_total,
                    ),
                    idle_pct: pct(
                        stat.aggregate
                            .idle_ticks()
                            .saturating_sub(baseline.aggregate.idle_ticks()),
                        d_total,
                    ),
                    per_core_pct: stat
                        .per_core
                        .iter()
                        .enumerate()
                        .map(|(i, cur)| {
                            let prev_core =
                                baseline.per_core.get(i).copied().unwrap_or_default();
                            usage_pct(prev_core, *cur)
                        })
                        .collect(),
                };

                *guard = Some(stat);
                to_values(&values)
            })
            .await
            .map_err(|e| SampleError(format!("cpu sampler task failed: {e}")))?
        }
    }

}

#[cfg(not(target_os = "linux"))]
pub use fallback::CpuSampler;

#[cfg(not(target_os = "linux"))]
mod fallback {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// sysinfo-backed sampler: only an overall usage percentage is
    /// available, reported as `user_pct` with `system_pct = 0`.
    pub struct CpuSampler {
        system: Arc<Mutex<sysinfo::System>>,
    }

    impl CpuSampler {
        pub fn new() -> Self {
            Self {
                system: Arc::new(Mutex::new(sysinfo::System::new())),
            }
        }
    }

    impl Default for CpuSampler {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Sampler for CpuSampler {
        fn family(&self) -> MetricFamily {
            MetricFamily::Cpu
        }

        async fn sample(&self) -> Result<serde_json::Value, SampleError> {
            let system = self.system.clone();
            tokio::task::spawn_blocking(move || {
                let mut sys = system
                    .lock()
                    .map_err(|_| SampleError("cpu sampler state poisoned".into()))?;
                sys.refresh_cpu_usage();
                let usage = sys.global_cpu_usage() as f64;
                let values = CpuValues {
                    user_pct: usage,
                    system_pct: 0.0,
                    idle_pct: (100.0 - usage).max(0.0),
                    per_core_pct: sys.cpus().iter().map(|c| c.cpu_usage() as f64).collect(),
                };
                to_values(&values)
            })
            .await
            .map_err(|e| SampleError(format!("cpu sampler task failed: {e}")))?
        }
    }
}
