//! Copies bundled assets into their working locations before start-up.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use roadscan_types::{config::RoadscanConfig, Result};
use tracing::{debug, error, info};

use crate::ops_error;

#[derive(Debug, Clone)]
pub struct StagedAsset {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Default)]
pub struct StageReport {
    pub staged: Vec<StagedAsset>,
    /// (destination, reason) for every asset that could not be copied.
    pub failed: Vec<(PathBuf, String)>,
}

impl StageReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Stages the model and the video from `ops.assets_dir`, if configured.
///
/// Failures are collected, not returned early; initialising the predictor or
/// the frame source reports the missing file again on its own terms.
pub fn stage_assets(config: &RoadscanConfig) -> StageReport {
    let mut report = StageReport::default();
    let Some(assets_dir) = config.ops.assets_dir.as_deref() else {
        debug!("No assets directory configured; skipping staging");
        return report;
    };
    let assets_dir = Path::new(assets_dir);
    for target in [&config.model.model_path, &config.media.video_path] {
        let destination = PathBuf::from(target);
        match stage_asset(assets_dir, &destination) {
            Ok(asset) => report.staged.push(asset),
            Err(err) => {
                error!("Failed to stage {}: {err}", destination.display());
                report.failed.push((destination, err.to_string()));
            }
        }
    }
    report
}

/// Copies `assets_dir/<file name of destination>` to `destination`.
pub fn stage_asset(assets_dir: &Path, destination: &Path) -> Result<StagedAsset> {
    let name = destination
        .file_name()
        .ok_or_else(|| ops_error(format!("{} has no file name", destination.display())))?;
    let source = assets_dir.join(name);
    if source == destination {
        let bytes = fs::metadata(&source)
            .map_err(|err| ops_error(format!("asset {} unreadable: {err}", source.display())))?
            .len();
        return Ok(StagedAsset {
            source: source.clone(),
            destination: source,
            bytes,
        });
    }
    info!(
        "Copying {} to {}",
        source.display(),
        destination.display()
    );

    let reader = File::open(&source)
        .map_err(|err| ops_error(format!("cannot open asset {}: {err}", source.display())))?;
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            ops_error(format!("cannot create {}: {err}", parent.display()))
        })?;
    }
    let writer = File::create(destination).map_err(|err| {
        ops_error(format!("cannot create {}: {err}", destination.display()))
    })?;
    let mut writer = BufWriter::new(writer);
    let bytes = io::copy(&mut BufReader::new(reader), &mut writer)
        .and_then(|bytes| writer.flush().map(|_| bytes))
        .map_err(|err| ops_error(format!("copy of {} failed: {err}", source.display())))?;
    info!("Copied {} ({} bytes)", destination.display(), bytes);

    Ok(StagedAsset {
        source,
        destination: destination.to_path_buf(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("roadscan-assets-{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("scratch dir");
        dir
    }

    #[test]
    fn copies_model_and_video() {
        let root = scratch("copy");
        let assets = root.join("assets");
        fs::create_dir_all(&assets).expect("assets dir");
        fs::write(assets.join("model.onnx"), vec![7u8; 10_000]).expect("model");
        fs::write(assets.join("test_video.mp4"), b"video").expect("video");

        let mut config = RoadscanConfig::default();
        config.ops.assets_dir = Some(assets.to_string_lossy().into_owned());
        config.model.model_path = root.join("files/model.onnx").to_string_lossy().into_owned();
        config.media.video_path = root
            .join("files/test_video.mp4")
            .to_string_lossy()
            .into_owned();

        let report = stage_assets(&config);
        assert!(report.is_complete(), "{:?}", report.failed);
        assert_eq!(report.staged.len(), 2);
        assert_eq!(report.staged[0].bytes, 10_000);
        assert_eq!(
            fs::read(root.join("files/test_video.mp4")).expect("staged video"),
            b"video"
        );
        fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn missing_asset_is_reported_not_fatal() {
        let root = scratch("missing");
        let mut config = RoadscanConfig::default();
        config.ops.assets_dir = Some(root.join("assets").to_string_lossy().into_owned());
        config.model.model_path = root.join("files/model.onnx").to_string_lossy().into_owned();
        config.media.video_path = root.join("files/clip.mp4").to_string_lossy().into_owned();

        let report = stage_assets(&config);
        assert_eq!(report.staged.len(), 0);
        assert_eq!(report.failed.len(), 2);
        fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn no_assets_dir_means_nothing_to_do() {
        let mut config = RoadscanConfig::default();
        config.ops.assets_dir = None;
        let report = stage_assets(&config);
        assert!(report.is_complete());
        assert!(report.staged.is_empty());
    }
}
