//! Fixed-shape model input and output containers.

use serde::{Deserialize, Serialize};

use crate::{road::RoadType, Result, RoadscanError};

/// Spatial side length expected by the road-type model.
pub const INPUT_SIZE: usize = 360;
/// Color channels in the input tensor.
pub const INPUT_CHANNELS: usize = 3;
/// Values in one channel plane.
pub const PLANE_LEN: usize = INPUT_SIZE * INPUT_SIZE;
/// Executor-facing shape, batch dimension included.
pub const INPUT_SHAPE: [usize; 4] = [1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE];

/// Normalized [channel, height, width] tensor. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    pub const LEN: usize = INPUT_CHANNELS * PLANE_LEN;

    pub fn from_vec(data: Vec<f32>) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(RoadscanError::Vision(format!(
                "input tensor expects {} values, got {}",
                Self::LEN,
                data.len()
            )));
        }
        Ok(Self { data })
    }

    /// Logical shape without the batch dimension.
    pub fn shape(&self) -> [usize; 3] {
        [INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, channel: usize, row: usize, col: usize) -> Option<f32> {
        if channel >= INPUT_CHANNELS || row >= INPUT_SIZE || col >= INPUT_SIZE {
            return None;
        }
        self.data
            .get(channel * PLANE_LEN + row * INPUT_SIZE + col)
            .copied()
    }

    pub fn plane(&self, channel: usize) -> Option<&[f32]> {
        let start = channel.checked_mul(PLANE_LEN)?;
        self.data.get(start..start + PLANE_LEN)
    }
}

/// One score per [`RoadType`], indexed positionally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreVector([f32; RoadType::COUNT]);

impl ScoreVector {
    pub fn new(scores: [f32; RoadType::COUNT]) -> Self {
        Self(scores)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn get(&self, label: RoadType) -> f32 {
        self.0[label.index()]
    }

    /// Applies `f` to every score, keeping positions.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self(self.0.map(f))
    }
}

impl TryFrom<&[f32]> for ScoreVector {
    type Error = RoadscanError;

    fn try_from(values: &[f32]) -> Result<Self> {
        let scores: [f32; RoadType::COUNT] = values.try_into().map_err(|_| {
            RoadscanError::Engine(format!(
                "model returned {} scores, expected {}",
                values.len(),
                RoadType::COUNT
            ))
        })?;
        Ok(Self(scores))
    }
}

impl TryFrom<Vec<f32>> for ScoreVector {
    type Error = RoadscanError;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Self::try_from(values.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_tensor_rejects_wrong_length() {
        assert!(InputTensor::from_vec(vec![0.0; 10]).is_err());
        let tensor = InputTensor::from_vec(vec![0.0; InputTensor::LEN]).expect("tensor");
        assert_eq!(tensor.shape(), [3, 360, 360]);
        assert_eq!(tensor.plane(2).map(|p| p.len()), Some(PLANE_LEN));
        assert!(tensor.plane(3).is_none());
        assert!(tensor.get(0, 360, 0).is_none());
    }

    #[test]
    fn input_tensor_indexes_channel_major() {
        let mut data = vec![0.0; InputTensor::LEN];
        data[2 * PLANE_LEN + 5 * INPUT_SIZE + 7] = 0.25;
        let tensor = InputTensor::from_vec(data).expect("tensor");
        assert_eq!(tensor.get(2, 5, 7), Some(0.25));
        assert_eq!(tensor.get(1, 5, 7), Some(0.0));
    }

    #[test]
    fn score_vector_requires_five_scores() {
        assert!(ScoreVector::try_from(vec![0.1, 0.2]).is_err());
        assert!(ScoreVector::try_from(vec![0.0; 6]).is_err());
        let scores = ScoreVector::try_from(vec![0.1, 0.9, 0.05, 0.05, 0.0]).expect("scores");
        assert_eq!(scores.get(RoadType::Concrete), 0.9);
    }
}
