use chrono::Utc;
use roadscan_types::telemetry::PerformanceSample;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::time::{sleep, Duration};
use tracing::warn;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Samples memory and CPU counters for this process.
pub struct PerformanceProbe {
    system: System,
    pid: Option<Pid>,
    cpu_window: Duration,
}

impl PerformanceProbe {
    pub fn new(cpu_window: Duration) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(err) => {
                warn!("Process counters unavailable: {err}");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
            cpu_window,
        }
    }

    /// Collects counters; CPU usage is measured across `cpu_window`.
    pub async fn sample(&mut self, inference_ms: f64) -> PerformanceSample {
        self.refresh_process();
        sleep(self.cpu_window).await;
        self.refresh_process();
        self.system.refresh_memory();

        let (process_memory_mb, cpu_usage_pct) = self
            .pid
            .and_then(|pid| self.system.process(pid))
            .map(|process| {
                (
                    process.memory() as f64 / BYTES_PER_MB,
                    f64::from(process.cpu_usage()),
                )
            })
            .unwrap_or_default();

        PerformanceSample {
            inference_ms,
            process_memory_mb,
            system_memory_used_pct: memory_used_pct(
                self.system.total_memory(),
                self.system.available_memory(),
            ),
            cpu_usage_pct,
            captured_at: Utc::now(),
        }
    }

    fn refresh_process(&mut self) {
        if let Some(pid) = self.pid {
            self.system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing().with_cpu().with_memory(),
            );
        }
    }
}

/// Share of physical memory in use, as a percentage.
pub fn memory_used_pct(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(available) as f64;
    used / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_percentage_bounds() {
        assert_eq!(memory_used_pct(0, 0), 0.0);
        assert_eq!(memory_used_pct(100, 25), 75.0);
        assert_eq!(memory_used_pct(100, 200), 0.0);
        assert_eq!(memory_used_pct(8, 0), 100.0);
    }

    #[tokio::test]
    async fn sample_reports_sane_counters() {
        let mut probe = PerformanceProbe::new(Duration::from_millis(20));
        let sample = probe.sample(4.5).await;
        assert_eq!(sample.inference_ms, 4.5);
        assert!(sample.process_memory_mb >= 0.0);
        assert!((0.0..=100.0).contains(&sample.system_memory_used_pct));
        assert!(sample.cpu_usage_pct >= 0.0);
    }
}
