// src/pipeline/session.rs
//
// Behavior statistics over a brake-loop session, written as JSON at shutdown.

use crate::signal::AccelSample;
use crate::types::BehaviorClass;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

const RECENT_HISTORY: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct BehaviorObservation {
    pub t_ms: f64,
    pub class: u8,
    pub behavior_type: &'static str,
    pub confidence: Option<f64>,
}

#[derive(Debug, Default)]
pub struct BehaviorSession {
    total_samples: u64,
    class_counts: [u64; 4],
    confidence_sum: f64,
    confidence_count: u64,
    first_t_ms: Option<f64>,
    last_t_ms: Option<f64>,
    recent: Vec<BehaviorObservation>,
}

impl BehaviorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: &AccelSample) {
        self.total_samples += 1;
        self.first_t_ms.get_or_insert(sample.timestamp_ms);
        self.last_t_ms = Some(sample.timestamp_ms);

        let Some(class) = sample.behavior else {
            return;
        };
        self.class_counts[(class.code() - 1) as usize] += 1;
        if let Some(c) = sample.confidence.filter(|c| c.is_finite()) {
            self.confidence_sum += c;
            self.confidence_count += 1;
        }

        if self.recent.len() == RECENT_HISTORY {
            self.recent.remove(0);
        }
        self.recent.push(BehaviorObservation {
            t_ms: sample.timestamp_ms,
            class: class.code(),
            behavior_type: class.behavior_type(),
            confidence: sample.confidence,
        });
    }

    pub fn count(&self, class: BehaviorClass) -> u64 {
        self.class_counts[(class.code() - 1) as usize]
    }

    /// Most frequent class; ties go to the higher-risk class.
    pub fn dominant(&self) -> Option<BehaviorClass> {
        BehaviorClass::ALL
            .iter()
            .copied()
            .filter(|c| self.count(*c) > 0)
            .max_by_key(|c| (self.count(*c), c.code()))
    }

    pub fn summary(&self) -> SessionSummary {
        let classified = self.class_counts.iter().sum();
        SessionSummary {
            start_t_ms: self.first_t_ms,
            end_t_ms: self.last_t_ms,
            total_samples: self.total_samples,
            classified_samples: classified,
            dominant_behavior: self.dominant().map(|c| c.behavior_type()),
            average_confidence: (self.confidence_count > 0)
                .then(|| self.confidence_sum / self.confidence_count as f64),
            behavior_distribution: BehaviorClass::ALL
                .iter()
                .map(|c| (c.behavior_type(), self.count(*c)))
                .collect(),
            recent_history: self.recent.clone(),
        }
    }

    pub fn write_summary(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.summary())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write session summary {}", path.display()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub start_t_ms: Option<f64>,
    pub end_t_ms: Option<f64>,
    pub total_samples: u64,
    pub classified_samples: u64,
    pub dominant_behavior: Option<&'static str>,
    pub average_confidence: Option<f64>,
    pub behavior_distribution: BTreeMap<&'static str, u64>,
    pub recent_history: Vec<BehaviorObservation>,
}
