use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tensor::ScoreVector;

/// Road surface classes, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadType {
    Asphalt,
    Concrete,
    Gravel,
    Dirt,
    Unknown,
}

impl RoadType {
    pub const COUNT: usize = 5;
    pub const ALL: [RoadType; Self::COUNT] = [
        RoadType::Asphalt,
        RoadType::Concrete,
        RoadType::Gravel,
        RoadType::Dirt,
        RoadType::Unknown,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            RoadType::Asphalt => 0,
            RoadType::Concrete => 1,
            RoadType::Gravel => 2,
            RoadType::Dirt => 3,
            RoadType::Unknown => 4,
        }
    }

    /// Stable key used for localisation tables and logs.
    pub fn resource_key(self) -> &'static str {
        match self {
            RoadType::Asphalt => "road_type_asphalt",
            RoadType::Concrete => "road_type_concrete",
            RoadType::Gravel => "road_type_gravel",
            RoadType::Dirt => "road_type_dirt",
            RoadType::Unknown => "road_type_unknown",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            RoadType::Asphalt => "Asphalt",
            RoadType::Concrete => "Concrete",
            RoadType::Gravel => "Gravel",
            RoadType::Dirt => "Dirt",
            RoadType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Outcome of one classified frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub label: RoadType,
    pub scores: ScoreVector,
    pub inference_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips_through_all() {
        for (idx, label) in RoadType::ALL.iter().enumerate() {
            assert_eq!(label.index(), idx);
            assert_eq!(RoadType::from_index(idx), Some(*label));
        }
        assert_eq!(RoadType::from_index(RoadType::COUNT), None);
    }

    #[test]
    fn resource_keys_follow_label_order() {
        assert_eq!(RoadType::Asphalt.resource_key(), "road_type_asphalt");
        assert_eq!(RoadType::Unknown.resource_key(), "road_type_unknown");
        assert_eq!(RoadType::Gravel.to_string(), "Gravel");
    }
}
