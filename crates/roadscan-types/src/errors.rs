use thiserror::Error;

pub type Result<T, E = RoadscanError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum RoadscanError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("media error: {0}")]
    Media(String),
    #[error("vision error: {0}")]
    Vision(String),
    #[error("engine error: {0}")]
    Engine(String),
    #[error("orchestrator error: {0}")]
    Orchestrator(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
