// src/pipeline/mod.rs

pub mod event_sink;
pub mod metrics;
pub mod runner;
pub mod session;
pub mod tick_log;

pub use event_sink::ConfiguredSink;
pub use metrics::PipelineMetrics;
pub use runner::{BrakeRunner, LaneRunner};
pub use tick_log::TickLog;
