use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device counters captured after a classified frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub inference_ms: f64,
    /// Resident memory of this process.
    pub process_memory_mb: f64,
    pub system_memory_used_pct: f64,
    pub cpu_usage_pct: f64,
    pub captured_at: DateTime<Utc>,
}

impl PerformanceSample {
    pub fn inference_only(inference_ms: f64) -> Self {
        Self {
            inference_ms,
            process_memory_mb: 0.0,
            system_memory_used_pct: 0.0,
            cpu_usage_pct: 0.0,
            captured_at: Utc::now(),
        }
    }
}

impl fmt::Display for PerformanceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Inference: {:.1} ms", self.inference_ms)?;
        writeln!(f, "Memory: {:.1} MB (RSS)", self.process_memory_mb)?;
        writeln!(f, "System memory: {:.1}% used", self.system_memory_used_pct)?;
        write!(f, "CPU: {:.1}%", self.cpu_usage_pct)
    }
}

/// Running counters for one sampling session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTelemetry {
    pub ticks: u64,
    pub classified: u64,
    pub missing_frames: u64,
    pub failures: u64,
    pub last_sample: Option<PerformanceSample>,
}

impl SessionTelemetry {
    pub fn mean_classified_ratio(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.classified as f64 / self.ticks as f64
        }
    }
}
