//! Frame preprocessing and label decision for the road-type model.

pub mod decision;
pub mod preprocess;

use roadscan_types::RoadscanError;

pub use decision::classify;
pub use preprocess::{preprocess, scaled_dimensions, TensorPreprocessor};

pub fn vision_error(message: impl Into<String>) -> RoadscanError {
    RoadscanError::Vision(message.into())
}
