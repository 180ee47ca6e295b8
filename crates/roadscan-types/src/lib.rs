//! Shared domain types for the Roadscan project.

pub mod config;
pub mod events;
pub mod road;
pub mod telemetry;
pub mod tensor;
pub mod vision;

mod errors;

pub use errors::{Result, RoadscanError};
