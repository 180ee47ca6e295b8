//! Model execution seam and the road-type predictor built on it.

pub mod accelerator;
pub mod onnx;
pub mod predictor;

use roadscan_types::{
    tensor::{InputTensor, ScoreVector},
    Result, RoadscanError,
};
use tracing::info;

pub use accelerator::{detect_hardware, select_target, ExecutionTarget};
pub use onnx::OnnxExecutor;
pub use predictor::RoadTypePredictor;

/// Runs the classification model on one input tensor.
pub trait ModelExecutor: Send {
    fn run(&mut self, input: &InputTensor) -> Result<ScoreVector>;
    fn describe(&self) -> String;
}

impl<E: ModelExecutor + ?Sized> ModelExecutor for Box<E> {
    fn run(&mut self, input: &InputTensor) -> Result<ScoreVector> {
        (**self).run(input)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Executor that answers every call with the same outcome.
pub struct StaticExecutor {
    outcome: std::result::Result<ScoreVector, String>,
    runs: u64,
}

impl StaticExecutor {
    pub fn new(scores: ScoreVector) -> Self {
        info!("Static executor answering {:?}", scores.as_slice());
        Self {
            outcome: Ok(scores),
            runs: 0,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            runs: 0,
        }
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }
}

impl ModelExecutor for StaticExecutor {
    fn run(&mut self, _input: &InputTensor) -> Result<ScoreVector> {
        self.runs += 1;
        self.outcome.clone().map_err(engine_error)
    }

    fn describe(&self) -> String {
        "static".into()
    }
}

pub fn engine_error(message: impl Into<String>) -> RoadscanError {
    RoadscanError::Engine(message.into())
}
