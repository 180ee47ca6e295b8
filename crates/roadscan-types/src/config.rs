use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Result, RoadscanError};

/// Events kept in memory when `ops.max_events` is not set.
pub const DEFAULT_MAX_EVENTS: usize = 1024;

/// Chipset identifiers known to run the model well through NNAPI.
pub const DEFAULT_ACCELERATED_SOCS: [&str; 8] = [
    "lahaina", "taro", "kalama", "sm8150", "sm8250", "sm8350", "sm8450", "sm8550",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub video_path: String,
    #[serde(default)]
    pub ffmpeg_path: Option<String>,
    #[serde(default)]
    pub ffprobe_path: Option<String>,
    #[serde(default = "default_true")]
    pub looping: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_path: String,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    /// Overrides chipset detection when set.
    #[serde(default)]
    pub hardware: Option<String>,
    #[serde(default = "default_accelerated_socs")]
    pub accelerated_socs: Vec<String>,
    #[serde(default)]
    pub intra_threads: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub interval_ms: u64,
    #[serde(default)]
    pub initial_delay_ms: u64,
    #[serde(default = "default_cpu_window_ms")]
    pub cpu_window_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub event_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
    pub telemetry_dir: String,
    /// Directory holding bundled copies of the model and video. When set,
    /// they are copied to `model.model_path` and `media.video_path` at boot.
    #[serde(default)]
    pub assets_dir: Option<String>,
    /// Most recent events retained by the telemetry store.
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadscanConfig {
    pub media: MediaConfig,
    pub model: ModelConfig,
    pub sampler: SamplerConfig,
    pub network: NetworkConfig,
    pub ops: OpsConfig,
}

fn default_true() -> bool {
    true
}

fn default_input_name() -> String {
    "input".into()
}

fn default_cpu_window_ms() -> u64 {
    100
}

fn default_max_events() -> usize {
    DEFAULT_MAX_EVENTS
}

fn default_accelerated_socs() -> Vec<String> {
    DEFAULT_ACCELERATED_SOCS.iter().map(|s| s.to_string()).collect()
}

impl Default for RoadscanConfig {
    fn default() -> Self {
        Self {
            media: MediaConfig {
                video_path: "files/test_video.mp4".into(),
                ffmpeg_path: None,
                ffprobe_path: None,
                looping: true,
            },
            model: ModelConfig {
                model_path: "files/model.onnx".into(),
                input_name: default_input_name(),
                hardware: None,
                accelerated_socs: default_accelerated_socs(),
                intra_threads: None,
            },
            sampler: SamplerConfig {
                interval_ms: 500,
                initial_delay_ms: 0,
                cpu_window_ms: default_cpu_window_ms(),
            },
            network: NetworkConfig { event_capacity: 64 },
            ops: OpsConfig {
                log_level: "info".into(),
                telemetry_dir: "telemetry".into(),
                assets_dir: Some("assets".into()),
                max_events: DEFAULT_MAX_EVENTS,
            },
        }
    }
}

impl RoadscanConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            RoadscanError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            RoadscanError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.sampler.interval_ms == 0 {
            return Err(RoadscanError::Configuration(
                "sampler.interval_ms must be greater than zero".into(),
            ));
        }
        if self.sampler.cpu_window_ms == 0 || self.sampler.cpu_window_ms >= self.sampler.interval_ms
        {
            return Err(RoadscanError::Configuration(
                "sampler.cpu_window_ms must be positive and shorter than sampler.interval_ms"
                    .into(),
            ));
        }
        if self.model.input_name.trim().is_empty() {
            return Err(RoadscanError::Configuration(
                "model.input_name must not be empty".into(),
            ));
        }
        if self.model.accelerated_socs.iter().any(|s| s.trim().is_empty()) {
            return Err(RoadscanError::Configuration(
                "model.accelerated_socs must not contain empty entries".into(),
            ));
        }
        if self.model.intra_threads == Some(0) {
            return Err(RoadscanError::Configuration(
                "model.intra_threads must be greater than zero when set".into(),
            ));
        }
        if self.network.event_capacity == 0 {
            return Err(RoadscanError::Configuration(
                "network.event_capacity must be greater than zero".into(),
            ));
        }
        if self.ops.max_events == 0 {
            return Err(RoadscanError::Configuration(
                "ops.max_events must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_roadscan_config_from_file() {
        let temp_path = std::env::temp_dir().join("roadscan-config-test.toml");
        let mut config = RoadscanConfig::default();
        config.sampler.interval_ms = 250;
        config.model.hardware = Some("qcom sm8350".into());

        let doc = toml::to_string(&config).expect("serialize config");
        fs::write(&temp_path, doc).expect("write temp config");

        let loaded = RoadscanConfig::from_file(&temp_path).expect("load config");
        assert_eq!(loaded.sampler.interval_ms, 250);
        assert_eq!(loaded.model.hardware.as_deref(), Some("qcom sm8350"));
        assert_eq!(loaded.model.accelerated_socs.len(), DEFAULT_ACCELERATED_SOCS.len());
        fs::remove_file(&temp_path).expect("cleanup temp config");
    }

    #[test]
    fn minimal_document_uses_serde_defaults() {
        let doc = r#"
            [media]
            video_path = "clip.mp4"

            [model]
            model_path = "model.onnx"

            [sampler]
            interval_ms = 500

            [network]
            event_capacity = 16

            [ops]
            log_level = "debug"
            telemetry_dir = "telemetry"
        "#;
        let config: RoadscanConfig = toml::from_str(doc).expect("parse");
        assert_eq!(config.model.input_name, "input");
        assert_eq!(config.sampler.cpu_window_ms, 100);
        assert!(config.media.looping);
        assert!(config.ops.assets_dir.is_none());
        assert_eq!(config.ops.max_events, DEFAULT_MAX_EVENTS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let err = RoadscanConfig::from_file("/nonexistent/roadscan.toml").unwrap_err();
        assert!(matches!(err, RoadscanError::Configuration(_)));
    }

    #[test]
    fn validate_configuration_rules() {
        let mut config = RoadscanConfig::default();
        assert!(config.validate().is_ok());

        config.sampler.interval_ms = 0;
        assert!(config.validate().is_err());
        config.sampler.interval_ms = 500;
        config.sampler.cpu_window_ms = 500;
        assert!(config.validate().is_err());
        config.sampler.cpu_window_ms = 100;
        config.model.input_name = " ".into();
        assert!(config.validate().is_err());
        config.model.input_name = "input".into();
        config.model.accelerated_socs.push(String::new());
        assert!(config.validate().is_err());
        config.model.accelerated_socs.pop();
        config.model.intra_threads = Some(0);
        assert!(config.validate().is_err());
        config.model.intra_threads = Some(2);
        config.network.event_capacity = 0;
        assert!(config.validate().is_err());
        config.network.event_capacity = 8;
        config.ops.max_events = 0;
        assert!(config.validate().is_err());
        config.ops.max_events = 16;
        assert!(config.validate().is_ok());
    }
}
