// src/detection/mod.rs

pub mod brake_classifier;
mod cooldown;
pub mod drift_state_machine;
mod smoother;
pub mod types;

// Re-export public APIs
pub use brake_classifier::{BrakeClassifier, BrakeConfig};
pub use drift_state_machine::{DriftConfig, LaneDriftDetector};
pub use types::*;
