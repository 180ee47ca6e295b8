use std::time::Instant;

use roadscan_types::{road::Prediction, vision::ImageFrame, Result};
use roadscan_vision::{classify, TensorPreprocessor};
use tracing::debug;

use crate::ModelExecutor;

/// Preprocess, execute, decide.
pub struct RoadTypePredictor<E> {
    executor: E,
    preprocessor: TensorPreprocessor,
}

impl<E: ModelExecutor> RoadTypePredictor<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            preprocessor: TensorPreprocessor,
        }
    }

    pub fn predict(&mut self, frame: &ImageFrame) -> Result<Prediction> {
        debug!("Classifying {}x{} frame", frame.width, frame.height);
        let start = Instant::now();
        let tensor = self.preprocessor.preprocess(frame)?;
        let scores = self.executor.run(&tensor)?;
        let label = classify(&scores);
        let inference_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!(
            "Predicted {} ({}) in {:.1} ms",
            label,
            label.resource_key(),
            inference_ms
        );
        Ok(Prediction {
            label,
            scores,
            inference_ms,
        })
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticExecutor;
    use roadscan_types::{road::RoadType, tensor::ScoreVector, RoadscanError};

    #[test]
    fn predicts_arg_max_label() {
        let executor = StaticExecutor::new(ScoreVector::new([0.1, 0.2, 0.05, 0.6, 0.05]));
        let mut predictor = RoadTypePredictor::new(executor);
        let prediction = predictor
            .predict(&ImageFrame::solid(640, 480, [90, 90, 90]))
            .expect("prediction");
        assert_eq!(prediction.label, RoadType::Dirt);
        assert!(prediction.inference_ms >= 0.0);
        assert_eq!(predictor.executor().runs(), 1);
    }

    #[test]
    fn executor_failure_propagates() {
        let mut predictor = RoadTypePredictor::new(StaticExecutor::failing("session closed"));
        let err = predictor
            .predict(&ImageFrame::solid(360, 360, [0, 0, 0]))
            .unwrap_err();
        assert!(matches!(err, RoadscanError::Engine(_)));
    }

    #[test]
    fn bad_frame_skips_executor() {
        let mut predictor =
            RoadTypePredictor::new(StaticExecutor::new(ScoreVector::new([1.0; 5])));
        assert!(predictor.predict(&ImageFrame::empty()).is_err());
        assert_eq!(predictor.executor().runs(), 0);
    }
}
