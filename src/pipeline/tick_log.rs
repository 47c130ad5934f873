// src/pipeline/tick_log.rs
//
// Per-tick JSONL audit trail, one file per detector per session.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct TickRecord {
    pub wall_clock: String,
    pub detector: &'static str,
    pub t_ms: f64,
    pub state: &'static str,
    /// Upstream geometry label, lane ticks only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane_state: Option<&'static str>,
    /// Null when the sample was dropped
    pub raw: Option<f64>,
    pub smoothed: f64,
    pub signal_left: bool,
    pub signal_right: bool,
    /// Kinds fired this tick, empty when nothing fired
    pub violations: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior_class: Option<u8>,
}

impl TickRecord {
    pub fn now(detector: &'static str, t_ms: f64, state: &'static str) -> Self {
        Self {
            wall_clock: chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            detector,
            t_ms,
            state,
            lane_state: None,
            raw: None,
            smoothed: 0.0,
            signal_left: false,
            signal_right: false,
            violations: Vec::new(),
            behavior_class: None,
        }
    }
}

pub struct TickLog<W: Write = BufWriter<File>> {
    writer: W,
    path: Option<PathBuf>,
}

impl TickLog<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create tick log {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: Some(path.to_path_buf()),
        })
    }
}

impl<W: Write> TickLog<W> {
    pub fn from_writer(writer: W) -> Self {
        Self { writer, path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one record. Flushed per line so a killed session keeps its trail.
    pub fn write(&mut self, record: &TickRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
