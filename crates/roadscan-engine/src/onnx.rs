use std::path::PathBuf;

use ndarray::ArrayView4;
use ort::{
    session::{builder::SessionBuilder, Session},
    value::TensorRef,
};
use roadscan_types::{
    config::ModelConfig,
    tensor::{InputTensor, ScoreVector, INPUT_SHAPE},
    Result,
};
use tracing::{debug, info};

use crate::{
    accelerator::{detect_hardware, select_target, ExecutionTarget},
    engine_error, ModelExecutor,
};

/// ONNX Runtime session over the road-type model.
pub struct OnnxExecutor {
    session: Session,
    input_name: String,
    target: ExecutionTarget,
    model_path: PathBuf,
}

impl OnnxExecutor {
    /// Loads the model. Failure here disables classification for the session.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let hardware = config.hardware.clone().or_else(detect_hardware);
        info!(
            "Device chipset: {}",
            hardware.as_deref().unwrap_or("<unknown>")
        );
        let target = select_target(hardware.as_deref(), &config.accelerated_socs);
        Self::with_target(config, target)
    }

    pub fn with_target(config: &ModelConfig, target: ExecutionTarget) -> Result<Self> {
        let model_path = PathBuf::from(&config.model_path);
        if !model_path.is_file() {
            return Err(engine_error(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }

        let mut builder = Session::builder()
            .map_err(|e| engine_error(format!("failed to create session builder: {e}")))?;
        if let Some(threads) = config.intra_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(|e| engine_error(format!("failed to set intra threads: {e}")))?;
        }
        builder = apply_target(builder, target)?;

        let session = builder.commit_from_file(&model_path).map_err(|e| {
            engine_error(format!(
                "failed to load model from {}: {e}",
                model_path.display()
            ))
        })?;
        info!(
            "Loaded model {} (input '{}', target {:?})",
            model_path.display(),
            config.input_name,
            target
        );

        Ok(Self {
            session,
            input_name: config.input_name.clone(),
            target,
            model_path,
        })
    }
}

fn apply_target(builder: SessionBuilder, target: ExecutionTarget) -> Result<SessionBuilder> {
    match target {
        ExecutionTarget::Cpu => Ok(builder),
        #[cfg(feature = "nnapi")]
        ExecutionTarget::Nnapi => {
            use ort::execution_providers::{ExecutionProvider, NNAPIExecutionProvider};
            let ep = NNAPIExecutionProvider::default();
            let available = ep.is_available().unwrap_or(false);
            info!("NNAPI execution provider requested, available: {}", available);
            builder
                .with_execution_providers([ep.build()])
                .map_err(|e| engine_error(format!("failed to register NNAPI provider: {e}")))
        }
        #[cfg(not(feature = "nnapi"))]
        ExecutionTarget::Nnapi => {
            tracing::warn!("Built without the `nnapi` feature; falling back to CPU execution");
            Ok(builder)
        }
    }
}

impl ModelExecutor for OnnxExecutor {
    fn run(&mut self, input: &InputTensor) -> Result<ScoreVector> {
        let view = ArrayView4::from_shape(INPUT_SHAPE, input.as_slice())
            .map_err(|e| engine_error(format!("failed to shape input tensor: {e}")))?;
        let tensor = TensorRef::from_array_view(view)
            .map_err(|e| engine_error(format!("failed to create tensor ref: {e}")))?;
        debug!("Running model with input '{}' {:?}", self.input_name, INPUT_SHAPE);

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| engine_error(format!("inference failed: {e}")))?;
        let scores = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| engine_error(format!("model output is not f32: {e}")))?;
        let values: Vec<f32> = scores.iter().copied().collect();
        debug!("Model returned {} scores", values.len());
        ScoreVector::try_from(values)
    }

    fn describe(&self) -> String {
        format!("onnx:{} ({:?})", self.model_path.display(), self.target)
    }
}
