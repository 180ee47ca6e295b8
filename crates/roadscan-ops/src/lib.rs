//! Operational helpers: logging, telemetry persistence, asset staging, device counters.

pub mod assets;
pub mod performance;

use std::{
    collections::VecDeque,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex as StdMutex},
};

use chrono::Utc;
use roadscan_types::{
    config::{OpsConfig, DEFAULT_MAX_EVENTS},
    events::SystemEvent,
    telemetry::SessionTelemetry,
    Result, RoadscanError,
};
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub use assets::{stage_assets, StageReport, StagedAsset};
pub use performance::PerformanceProbe;

/// Where formatted log lines are written.
#[derive(Debug, Clone)]
pub enum LogSink {
    Stderr,
    /// Plain-text file, used while a full-screen UI owns the terminal.
    File(PathBuf),
}

pub fn init_tracing(config: &OpsConfig, sink: LogSink) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| ops_error(format!("failed to create log filter: {err}")))?;

    let result = match sink {
        LogSink::Stderr => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogSink::File(path) => {
            let file = File::create(&path).map_err(|err| {
                ops_error(format!("failed to open log file {}: {err}", path.display()))
            })?;
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(StdMutex::new(file))
                .try_init()
        }
    };
    result.map_err(|err| ops_error(format!("tracing init error: {err}")))
}

#[derive(Default)]
struct EventLog {
    events: VecDeque<SystemEvent>,
    dropped: u64,
}

/// In-memory telemetry store shared by the sampler and the UI.
///
/// Keeps at most `capacity` events; the oldest are discarded first.
#[derive(Clone)]
pub struct TelemetryStore {
    log: Arc<Mutex<EventLog>>,
    session: Arc<Mutex<SessionTelemetry>>,
    capacity: usize,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            log: Arc::new(Mutex::new(EventLog {
                events: VecDeque::with_capacity(capacity.min(DEFAULT_MAX_EVENTS)),
                dropped: 0,
            })),
            session: Arc::new(Mutex::new(SessionTelemetry::default())),
            capacity,
        }
    }

    pub async fn record_event(&self, event: SystemEvent) -> Result<()> {
        let mut log = self.log.lock().await;
        if log.events.len() == self.capacity {
            log.events.pop_front();
            log.dropped += 1;
        }
        log.events.push_back(event);
        Ok(())
    }

    /// Events discarded because the store was full.
    pub async fn dropped_events(&self) -> u64 {
        self.log.lock().await.dropped
    }

    pub async fn update_session(&self, update: impl FnOnce(&mut SessionTelemetry)) {
        update(&mut *self.session.lock().await);
    }

    pub async fn session(&self) -> SessionTelemetry {
        self.session.lock().await.clone()
    }

    pub async fn snapshot_events(&self) -> Vec<SystemEvent> {
        self.log.lock().await.events.iter().cloned().collect()
    }

    /// Writes every recorded event as one JSON object per line.
    pub async fn export_jsonl(&self, dir: &Path) -> Result<PathBuf> {
        let events = self.snapshot_events().await;
        let dropped = self.dropped_events().await;
        if dropped > 0 {
            warn!("{} older events were discarded before export", dropped);
        }
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let path = dir.join(format!("events_{}.jsonl", timestamp));
        let file = File::create(&path)
            .map_err(|err| ops_error(format!("failed to create {}: {err}", path.display())))?;
        let mut writer = BufWriter::new(file);
        for event in &events {
            serde_json::to_writer(&mut writer, event)
                .map_err(|err| ops_error(format!("failed to encode event: {err}")))?;
            writer
                .write_all(b"\n")
                .map_err(|err| ops_error(format!("failed to write event log: {err}")))?;
        }
        writer
            .flush()
            .map_err(|err| ops_error(format!("failed to flush event log: {err}")))?;
        info!("Exported {} events to {:?}", events.len(), path);
        Ok(path)
    }
}

pub fn ensure_telemetry_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    fs::create_dir_all(&dir)
        .map_err(|err| ops_error(format!("failed to create telemetry dir: {err}")))?;
    info!("Telemetry directory ready at {:?}", dir);
    Ok(dir)
}

pub fn ops_error(message: impl Into<String>) -> RoadscanError {
    RoadscanError::Ops(message.into())
}
