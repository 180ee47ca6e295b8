mod ui;

use std::{
    path::{Path, PathBuf},
    sync::mpsc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use roadscan_engine::{
    detect_hardware, select_target, ModelExecutor, OnnxExecutor, RoadTypePredictor,
    StaticExecutor,
};
use roadscan_media::{FfmpegFrameSource, FrameSource};
use roadscan_network::{LocalPublisher, ResultPublisher};
use roadscan_ops::{ensure_telemetry_dir, init_tracing, stage_assets, LogSink, TelemetryStore};
use roadscan_orchestrator::{PlaybackClock, Sampler, SamplerState};
use roadscan_types::{
    config::{ModelConfig, RoadscanConfig},
    events::{LifecyclePhase, SystemEvent},
    road::RoadType,
    tensor::ScoreVector,
    vision::ImageFrame,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::ui::UiMessage;

const DEFAULT_CONFIG_PATH: &str = "configs/dev.toml";
/// Scores answered by `--mock-model`; asphalt wins.
const MOCK_SCORES: [f32; RoadType::COUNT] = [0.72, 0.12, 0.08, 0.05, 0.03];

#[derive(Debug, Parser)]
#[command(name = "roadscan", version, about = "Road surface classification from video")]
struct Cli {
    /// Config file; falls back to configs/dev.toml, then built-in defaults.
    #[arg(long, global = true, env = "ROADSCAN_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sample the configured video and classify frames on a timer.
    Run {
        /// Log to stderr and start inference immediately instead of showing the UI.
        #[arg(long)]
        headless: bool,
        /// Use a fixed-score executor instead of the ONNX model.
        #[arg(long)]
        mock_model: bool,
    },
    /// Classify a single image file.
    Classify {
        image: PathBuf,
        #[arg(long)]
        mock_model: bool,
    },
    /// Report chipset, accelerator choice and video properties.
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    match cli.command {
        Command::Run {
            headless,
            mock_model,
        } => run(config, headless, mock_model).await,
        Command::Classify { image, mock_model } => classify(&config, &image, mock_model),
        Command::Probe => probe(&config).await,
    }
}

async fn run(config: RoadscanConfig, headless: bool, mock_model: bool) -> Result<()> {
    let telemetry_dir = ensure_telemetry_dir(&config.ops.telemetry_dir)?;
    let sink = if headless {
        LogSink::Stderr
    } else {
        LogSink::File(telemetry_dir.join("roadscan.log"))
    };
    init_tracing(&config.ops, sink)?;

    let publisher = LocalPublisher::new(config.network.event_capacity);
    let telemetry = TelemetryStore::with_capacity(config.ops.max_events);
    let (ui_tx, ui_rx) = mpsc::channel();
    let forwarder = (!headless).then(|| {
        let mut events = publisher.subscribe();
        let ui_tx = ui_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if ui_tx.send(UiMessage::Event(event)).is_err() {
                    break;
                }
            }
        })
    });
    announce(&publisher, &telemetry, SystemEvent::lifecycle(LifecyclePhase::Boot, None)).await;

    let report = stage_assets(&config);
    let message = format!(
        "staged {} assets, {} failed",
        report.staged.len(),
        report.failed.len()
    );
    announce(&publisher, &telemetry, SystemEvent::ops(message, &["assets"])).await;

    let initial = if headless {
        SamplerState::Enabled
    } else {
        SamplerState::Disabled
    };
    let (control_tx, control_rx) = watch::channel(initial);

    let (sampler_task, summary) = match prepare_pipeline(&config, mock_model) {
        PipelineStatus::Ready(Pipeline { source, executor }) => {
            let duration_ms = match source.metadata().await {
                Ok(metadata) => {
                    info!(
                        "Video {}x{} ({:?} ms)",
                        metadata.width, metadata.height, metadata.duration_ms
                    );
                    metadata.duration_ms
                }
                Err(err) => {
                    warn!("Video probe failed, playback will not loop: {err}");
                    None
                }
            };
            let summary = format!(
                "{} every {}ms",
                executor.describe(),
                config.sampler.interval_ms
            );
            let mut sampler = Sampler::new(
                config.sampler.clone(),
                source,
                RoadTypePredictor::new(executor),
                publisher.clone(),
                telemetry.clone(),
                PlaybackClock::new(duration_ms, config.media.looping),
            );
            let ui_tx = ui_tx.clone();
            let task = tokio::spawn(async move {
                let result = sampler.run(control_rx).await;
                if let Err(err) = &result {
                    error!("Sampler stopped: {err}");
                    let _ = ui_tx.send(UiMessage::Shutdown);
                }
                result
            });
            (Some(task), summary)
        }
        PipelineStatus::Unavailable(reason) => {
            error!("Pipeline unavailable: {reason}");
            if headless {
                anyhow::bail!("pipeline unavailable: {reason}");
            }
            announce(&publisher, &telemetry, SystemEvent::ops(reason, &["pipeline"])).await;
            (None, "pipeline unavailable".to_string())
        }
    };
    drop(ui_tx);

    if headless {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
        info!("Interrupted; shutting down");
        drop(control_tx);
    } else {
        tokio::task::spawn_blocking(move || ui::run(ui_rx, control_tx, summary))
            .await
            .context("ui thread panicked")??;
    }

    if let Some(task) = sampler_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("Sampler ended with error: {err}"),
            Err(err) => warn!("Sampler task failed: {err}"),
        }
    }
    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }

    announce(&publisher, &telemetry, SystemEvent::lifecycle(LifecyclePhase::Shutdown, None))
        .await;
    let session = telemetry.session().await;
    info!(
        "Session: {} ticks, {} classified ({:.0}%), {} missing frames, {} failures",
        session.ticks,
        session.classified,
        session.mean_classified_ratio() * 100.0,
        session.missing_frames,
        session.failures
    );
    telemetry.export_jsonl(&telemetry_dir).await?;
    Ok(())
}

fn classify(config: &RoadscanConfig, image_path: &Path, mock_model: bool) -> Result<()> {
    init_tracing(&config.ops, LogSink::Stderr)?;
    let frame = load_frame(image_path)?;
    let executor = build_executor(&config.model, mock_model)?;
    let mut predictor = RoadTypePredictor::new(executor);
    let prediction = predictor.predict(&frame)?;

    println!("{} ({})", prediction.label, prediction.label.resource_key());
    for label in RoadType::ALL {
        println!("  {:<10} {:>10.4}", label.display_name(), prediction.scores.get(label));
    }
    println!("Inference: {:.1} ms", prediction.inference_ms);
    Ok(())
}

async fn probe(config: &RoadscanConfig) -> Result<()> {
    init_tracing(&config.ops, LogSink::Stderr)?;
    let hardware = config.model.hardware.clone().or_else(detect_hardware);
    let target = select_target(hardware.as_deref(), &config.model.accelerated_socs);
    println!("Chipset: {}", hardware.as_deref().unwrap_or("unknown"));
    println!("Execution target: {:?}", target);

    let source = FfmpegFrameSource::new(&config.media)?;
    let metadata = source.metadata().await?;
    println!("Video: {}", source.video_path().display());
    println!("  Size: {}x{}", metadata.width, metadata.height);
    match metadata.duration_ms {
        Some(duration) => println!("  Duration: {} ms", duration),
        None => println!("  Duration: unknown"),
    }
    Ok(())
}

/// Frame source and executor ready to drive the sampler.
struct Pipeline {
    source: FfmpegFrameSource,
    executor: Box<dyn ModelExecutor>,
}

enum PipelineStatus {
    Ready(Pipeline),
    /// Which input could not be opened, and why.
    Unavailable(String),
}

/// Opens the video and loads the model. Neither failure is fatal here; the
/// caller decides whether to carry on without a pipeline.
fn prepare_pipeline(config: &RoadscanConfig, mock_model: bool) -> PipelineStatus {
    let source = match FfmpegFrameSource::new(&config.media) {
        Ok(source) => source,
        Err(err) => return PipelineStatus::Unavailable(format!("video unavailable: {err}")),
    };
    match build_executor(&config.model, mock_model) {
        Ok(executor) => PipelineStatus::Ready(Pipeline { source, executor }),
        Err(err) => PipelineStatus::Unavailable(format!("model unavailable: {err}")),
    }
}

fn build_executor(
    config: &ModelConfig,
    mock_model: bool,
) -> roadscan_types::Result<Box<dyn ModelExecutor>> {
    if mock_model {
        return Ok(Box::new(StaticExecutor::new(ScoreVector::new(MOCK_SCORES))));
    }
    Ok(Box::new(OnnxExecutor::new(config)?))
}

fn load_frame(path: &Path) -> Result<ImageFrame> {
    let image = image::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(ImageFrame::from_rgba(width, height, image.into_raw()))
}

async fn announce(publisher: &LocalPublisher, telemetry: &TelemetryStore, event: SystemEvent) {
    if let Err(err) = telemetry.record_event(event.clone()).await {
        warn!("Failed to record event: {err}");
    }
    if let Err(err) = publisher.publish(event).await {
        warn!("Failed to publish event: {err}");
    }
}

fn load_config(path: Option<&Path>) -> RoadscanConfig {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    match RoadscanConfig::from_file(path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                default_config()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            default_config()
        }
    }
}

fn default_config() -> RoadscanConfig {
    let config = RoadscanConfig::default();
    debug_assert!(config.validate().is_ok());
    config
}
