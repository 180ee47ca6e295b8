use roadscan_types::{road::RoadType, tensor::ScoreVector};

/// Picks the label with the highest score. Ties keep the earliest index.
pub fn classify(scores: &ScoreVector) -> RoadType {
    RoadType::from_index(arg_max(scores.as_slice())).unwrap_or(RoadType::Unknown)
}

/// Left-to-right scan with strict `>` seeded with index 0. A NaN after the
/// first slot never displaces the running max; a NaN in the first slot is
/// never beaten, so index 0 is returned.
fn arg_max(values: &[f32]) -> usize {
    let mut best = 0;
    let Some(&first) = values.first() else {
        return best;
    };
    let mut best_value = first;
    for (idx, &value) in values.iter().enumerate().skip(1) {
        if value > best_value {
            best_value = value;
            best = idx;
        }
    }
    best
}
