// src/signal/replay.rs
//
// JSONL trace replay. One sample per line:
//   lane:  {"t_ms": 1200.0, "deviation_px": -73.5, "lane_state": "left_drift"}
//   accel: {"t_ms": 20.0, "accel_g": 1.12, "behavior_class": 2, "confidence": 0.81}
// A line that does not parse counts as a missed acquisition, not a fatal error.

use super::{Acquisition, AccelSample, LaneSample, SignalSource};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::marker::PhantomData;
use std::path::Path;
use tracing::warn;

pub type ReplayLaneSource = ReplaySource<LaneSample, BufReader<File>>;
pub type ReplayAccelSource = ReplaySource<AccelSample, BufReader<File>>;

pub struct ReplaySource<T, R> {
    lines: Lines<R>,
    name: String,
    line_no: usize,
    bad_lines: usize,
    _sample: PhantomData<T>,
}

impl<T: DeserializeOwned> ReplaySource<T, BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open replay trace {}", path.display()))?;
        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

impl<T: DeserializeOwned, R: BufRead> ReplaySource<T, R> {
    pub fn from_reader(reader: R, name: String) -> Self {
        Self {
            lines: reader.lines(),
            name,
            line_no: 0,
            bad_lines: 0,
            _sample: PhantomData,
        }
    }

    pub fn bad_lines(&self) -> usize {
        self.bad_lines
    }
}

impl<T: DeserializeOwned, R: BufRead> SignalSource for ReplaySource<T, R> {
    type Sample = T;

    fn acquire(&mut self) -> Acquisition<T> {
        loop {
            let line = match self.lines.next() {
                None => return Acquisition::Exhausted,
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    warn!("Replay {} read error: {}", self.name, e);
                    return Acquisition::Exhausted;
                }
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            return match serde_json::from_str::<T>(trimmed) {
                Ok(sample) => Acquisition::Sample(sample),
                Err(e) => {
                    self.bad_lines += 1;
                    warn!("Replay {} line {}: {}", self.name, self.line_no, e);
                    Acquisition::Missed
                }
            };
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
