// src/pipeline/event_sink.rs
//
// Fire-and-forget delivery of violation events to the dashboard collector.
//
// `emit` returns a Result so failures stay visible, but `dispatch` is the
// only caller and it logs and counts the error and moves on: one attempt,
// hard timeout, no retries. A slow or absent collector must never stall the
// detection loop for longer than the configured timeout.

use super::metrics::PipelineMetrics;
use crate::detection::{LaneDeviationEvent, ViolationEvent};
use crate::types::SinkConfig;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("collector unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collector returned HTTP {0}")]
    Status(u16),
}

pub trait EventSink {
    fn emit(&self, event: &ViolationEvent) -> impl Future<Output = Result<(), SinkError>>;
}

/// Emit once and swallow the outcome into logs and counters.
pub async fn dispatch<S: EventSink>(sink: &S, event: &ViolationEvent, metrics: &PipelineMetrics) {
    metrics.record_violation(event.kind());

    match sink.emit(event).await {
        Ok(()) => {
            metrics.inc(&metrics.sink_successes);
            debug!("📡 Delivered {}", event.kind().as_str());
        }
        Err(e) => {
            metrics.inc(&metrics.sink_failures);
            warn!("📡 Event {} not delivered: {}", event.kind().as_str(), e);
        }
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// JSON record in the collector's format. Field names are part of the
/// dashboard contract; keep them as they are.
pub fn wire_record(event: &ViolationEvent) -> Value {
    let mut record = json!({
        "module": event.module(),
        "eventType": event.event_type(),
        "severity": event.severity().as_str(),
        "message": event.message(),
        "timestamp_ms": event.timestamp_ms(),
    });

    let extra = match event {
        ViolationEvent::LaneDeviation(e) => json!({
            "fromLane": LaneDeviationEvent::FROM_LANE,
            "toLane": e.side.lane_name(),
            "direction": e.side.as_str(),
            "deviation_px": round_to(e.ema_deviation_px, 1),
            "signalUsed": false,
            "safetyScore": e.safety_score(),
        }),
        ViolationEvent::Brake(e) => json!({
            "force": e.force,
            "speed": e.estimated_speed_mph,
            "behavior_class": e.behavior.map(|c| c.code()),
            "accel_magnitude": round_to(e.accel_magnitude_g, 2),
        }),
        ViolationEvent::BehaviorChange(e) => json!({
            "behavior_class": e.class.code(),
            "behavior_type": e.class.behavior_type(),
            "risk_level": e.class.risk_level(),
            "confidence": e.confidence.map(|c| round_to(c, 2)),
        }),
    };

    if let (Some(base), Value::Object(fields)) = (record.as_object_mut(), extra) {
        base.extend(fields);
    }
    record
}

// ============================================================================
// SINKS
// ============================================================================

/// POSTs each event to the collector with a hard request timeout.
pub struct HttpEventSink {
    http_client: reqwest::Client,
    url: String,
}

impl HttpEventSink {
    pub fn new(url: &str, timeout_ms: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            url: url.to_string(),
        })
    }
}

impl EventSink for HttpEventSink {
    async fn emit(&self, event: &ViolationEvent) -> Result<(), SinkError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&wire_record(event))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Emission switched off: events only reach the log.
#[derive(Debug, Default)]
pub struct LogOnlySink;

impl EventSink for LogOnlySink {
    async fn emit(&self, event: &ViolationEvent) -> Result<(), SinkError> {
        info!("📭 {} | {}", event.kind().as_str(), event.message());
        Ok(())
    }
}

/// Sink selected from `sink.enabled`.
pub enum ConfiguredSink {
    Http(HttpEventSink),
    LogOnly(LogOnlySink),
}

impl ConfiguredSink {
    pub fn from_config(config: &SinkConfig) -> Result<Self> {
        if config.enabled {
            info!(
                "📡 Emitting events to {} (timeout {}ms)",
                config.url, config.timeout_ms
            );
            Ok(Self::Http(HttpEventSink::new(&config.url, config.timeout_ms)?))
        } else {
            info!("⚪ Event emission disabled in config");
            Ok(Self::LogOnly(LogOnlySink))
        }
    }
}

impl EventSink for ConfiguredSink {
    async fn emit(&self, event: &ViolationEvent) -> Result<(), SinkError> {
        match self {
            Self::Http(sink) => sink.emit(event).await,
            Self::LogOnly(sink) => sink.emit(event).await,
        }
    }
}

/// In-memory sink for tests.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    pub events: std::cell::RefCell<Vec<ViolationEvent>>,
    pub fail: bool,
}

#[cfg(test)]
impl EventSink for RecordingSink {
    async fn emit(&self, event: &ViolationEvent) -> Result<(), SinkError> {
        self.events.borrow_mut().push(event.clone());
        if self.fail {
            Err(SinkError::Status(503))
        } else {
            Ok(())
        }
    }
}
