// src/pipeline/runner.rs
//
// Tick loops. Each loop owns its source and detector; one tick is
// acquire -> smooth/classify -> maybe emit -> log. The lane and brake loops
// are polled side by side on one thread and share only the sink and metrics.

use super::event_sink::{dispatch, EventSink};
use super::metrics::PipelineMetrics;
use super::session::BehaviorSession;
use super::tick_log::{TickLog, TickRecord};
use crate::detection::{BrakeClassifier, LaneDriftDetector};
use crate::signal::{Acquisition, AccelSample, LaneSample, SignalSource, TurnSignalInput};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Processed,
    /// Acquisition missed; detector state untouched
    Skipped,
    Finished,
}

/// Fixed-rate pacing, or a bare yield when the interval is 0.
struct Pacer(Option<Interval>);

impl Pacer {
    fn new(tick_interval_ms: u64) -> Self {
        if tick_interval_ms == 0 {
            return Self(None);
        }
        let mut interval = tokio::time::interval(Duration::from_millis(tick_interval_ms));
        // A slow tick (sink timeout) pushes the schedule back instead of bursting
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self(Some(interval))
    }

    async fn wait(&mut self) {
        match self.0.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => tokio::task::yield_now().await,
        }
    }
}

fn write_tick<W: Write>(log: &mut Option<TickLog<W>>, record: &TickRecord) {
    if let Some(writer) = log.as_mut() {
        if let Err(e) = writer.write(record) {
            warn!("📝 Tick log disabled after write failure: {:#}", e);
            *log = None;
        }
    }
}

// ============================================================================
// LANE LOOP
// ============================================================================

pub struct LaneRunner<S, T, W: Write = BufWriter<File>> {
    source: S,
    signals: T,
    detector: LaneDriftDetector,
    log: Option<TickLog<W>>,
}

impl<S, T, W> LaneRunner<S, T, W>
where
    S: SignalSource<Sample = LaneSample>,
    T: TurnSignalInput,
    W: Write,
{
    pub fn new(source: S, signals: T, detector: LaneDriftDetector) -> Self {
        Self {
            source,
            signals,
            detector,
            log: None,
        }
    }

    pub fn with_log(mut self, log: TickLog<W>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn detector(&self) -> &LaneDriftDetector {
        &self.detector
    }

    pub fn into_log(self) -> Option<TickLog<W>> {
        self.log
    }

    pub async fn tick<K: EventSink>(&mut self, sink: &K, metrics: &PipelineMetrics) -> TickOutcome {
        let sample = match self.source.acquire() {
            Acquisition::Sample(sample) => sample,
            Acquisition::Missed => {
                metrics.inc(&metrics.lane_missed);
                return TickOutcome::Skipped;
            }
            Acquisition::Exhausted => return TickOutcome::Finished,
        };
        metrics.inc(&metrics.lane_ticks);

        let signals = self.signals.read(sample.timestamp_ms);
        let tick = self.detector.update(&sample, signals);
        if tick.dropped {
            metrics.inc(&metrics.lane_frames_dropped);
        }
        if let Some(ref event) = tick.event {
            dispatch(sink, event, metrics).await;
        }

        let mut record = TickRecord::now("lane", sample.timestamp_ms, tick.state.as_str());
        record.lane_state = Some(sample.lane_state.as_str());
        record.raw = if tick.dropped { None } else { sample.deviation_px };
        record.smoothed = tick.smoothed_px;
        record.signal_left = signals.left;
        record.signal_right = signals.right;
        record.violations.extend(tick.event.iter().map(|e| e.kind().as_str()));
        write_tick(&mut self.log, &record);

        TickOutcome::Processed
    }

    pub async fn run<K: EventSink>(&mut self, sink: &K, metrics: &PipelineMetrics, tick_interval_ms: u64) {
        info!("🛣️  Lane loop started ({})", self.source.name());
        let mut pacer = Pacer::new(tick_interval_ms);

        loop {
            pacer.wait().await;
            if self.tick(sink, metrics).await == TickOutcome::Finished {
                break;
            }
        }

        info!(
            "🛣️  Lane loop finished: {} frames ({} dropped)",
            self.detector.frames_processed(),
            self.detector.frames_dropped()
        );
    }
}

// ============================================================================
// BRAKE LOOP
// ============================================================================

pub struct BrakeRunner<S, W: Write = BufWriter<File>> {
    source: S,
    classifier: BrakeClassifier,
    session: BehaviorSession,
    log: Option<TickLog<W>>,
}

impl<S, W> BrakeRunner<S, W>
where
    S: SignalSource<Sample = AccelSample>,
    W: Write,
{
    pub fn new(source: S, classifier: BrakeClassifier) -> Self {
        Self {
            source,
            classifier,
            session: BehaviorSession::new(),
            log: None,
        }
    }

    pub fn with_log(mut self, log: TickLog<W>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn session(&self) -> &BehaviorSession {
        &self.session
    }

    pub async fn tick<K: EventSink>(&mut self, sink: &K, metrics: &PipelineMetrics) -> TickOutcome {
        let sample = match self.source.acquire() {
            Acquisition::Sample(sample) => sample,
            Acquisition::Missed => {
                metrics.inc(&metrics.brake_missed);
                return TickOutcome::Skipped;
            }
            Acquisition::Exhausted => return TickOutcome::Finished,
        };
        metrics.inc(&metrics.brake_ticks);
        self.session.record(&sample);

        let tick = self.classifier.update(&sample);
        for event in &tick.events {
            dispatch(sink, event, metrics).await;
        }

        let state = tick.level.map(|l| l.as_str()).unwrap_or("none");
        let mut record = TickRecord::now("brake", sample.timestamp_ms, state);
        record.raw = Some(sample.accel_g);
        record.smoothed = tick.smoothed_g;
        record.violations.extend(tick.events.iter().map(|e| e.kind().as_str()));
        record.behavior_class = sample.behavior.map(|c| c.code());
        write_tick(&mut self.log, &record);

        TickOutcome::Processed
    }

    pub async fn run<K: EventSink>(&mut self, sink: &K, metrics: &PipelineMetrics, tick_interval_ms: u64) {
        info!("🚗 Brake loop started ({})", self.source.name());
        let mut pacer = Pacer::new(tick_interval_ms);
        let mut ticks = 0u64;

        loop {
            pacer.wait().await;
            match self.tick(sink, metrics).await {
                TickOutcome::Finished => break,
                TickOutcome::Processed => ticks += 1,
                TickOutcome::Skipped => debug!("IMU sample missed"),
            }
        }

        info!("🚗 Brake loop finished: {} samples", ticks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BrakeConfig, DriftConfig, ViolationEvent, ViolationKind};
    use crate::pipeline::event_sink::RecordingSink;
    use crate::signal::synthetic::{
        default_accel_scenario, default_lane_scenario, AccelSegment, LaneSegment,
    };
    use crate::signal::{NoTurnSignals, ScriptedTurnSignals, SyntheticAccelSource, SyntheticLaneSource};
    use crate::types::{BehaviorClass, Side, TurnSignalWindow};

    /// Yields the queued acquisitions, then Exhausted.
    struct Scripted<T>(std::collections::VecDeque<Acquisition<T>>);

    impl<T> SignalSource for Scripted<T> {
        type Sample = T;

        fn acquire(&mut self) -> Acquisition<T> {
            self.0.pop_front().unwrap_or(Acquisition::Exhausted)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn kinds(sink: &RecordingSink) -> Vec<ViolationKind> {
        sink.events.borrow().iter().map(|e| e.kind()).collect()
    }

    #[tokio::test]
    async fn test_default_lane_scenario_fires_once_per_side() {
        let source = SyntheticLaneSource::new(default_lane_scenario(), 100.0, 40.0);
        let mut runner: LaneRunner<_, _, Vec<u8>> =
            LaneRunner::new(source, NoTurnSignals, LaneDriftDetector::new(DriftConfig::default()))
                .with_log(TickLog::from_writer(Vec::new()));
        let sink = RecordingSink::default();
        let metrics = PipelineMetrics::new();

        runner.run(&sink, &metrics, 0).await;

        assert_eq!(
            kinds(&sink),
            vec![
                ViolationKind::UnsignaledLeftDeviation,
                ViolationKind::UnsignaledRightDeviation
            ]
        );
        let summary = metrics.summary();
        assert_eq!(summary.lane_ticks, 140);
        assert_eq!(summary.lane_frames_dropped, 10);
        assert_eq!(summary.sink_successes, 2);

        let log = String::from_utf8(runner.into_log().unwrap().into_inner()).unwrap();
        assert_eq!(log.lines().count(), 140);
        assert_eq!(log.matches("unsignaled_left_deviation").count(), 1);
        assert_eq!(log.matches("\"no_lanes_detected\"").count(), 10);
    }

    #[tokio::test]
    async fn test_tick_log_records_lane_state_of_dropped_frames() {
        let source = SyntheticLaneSource::new(
            vec![LaneSegment::steady(1, -70.0), LaneSegment::occluded(1)],
            100.0,
            40.0,
        );
        let mut runner: LaneRunner<_, _, Vec<u8>> =
            LaneRunner::new(source, NoTurnSignals, LaneDriftDetector::new(DriftConfig::default()))
                .with_log(TickLog::from_writer(Vec::new()));

        runner.run(&RecordingSink::default(), &PipelineMetrics::new(), 0).await;

        let log = String::from_utf8(runner.into_log().unwrap().into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["lane_state"], "left_drift");
        assert!(lines[0]["raw"].is_number());
        assert_eq!(lines[1]["lane_state"], "no_lanes_detected");
        assert!(lines[1]["raw"].is_null());
    }

    #[tokio::test]
    async fn test_blinker_suppresses_lane_violation() {
        let source = SyntheticLaneSource::new(vec![LaneSegment::steady(25, -70.0)], 100.0, 40.0);
        let signals = ScriptedTurnSignals::new(vec![TurnSignalWindow {
            side: Side::Left,
            from_ms: 0.0,
            to_ms: 10_000.0,
        }]);
        let mut runner: LaneRunner<_, _, Vec<u8>> =
            LaneRunner::new(source, signals, LaneDriftDetector::new(DriftConfig::default()));
        let sink = RecordingSink::default();

        runner.run(&sink, &PipelineMetrics::new(), 0).await;

        assert!(sink.events.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_missed_acquisition_skips_tick() {
        let sample = LaneSample {
            timestamp_ms: 0.0,
            deviation_px: Some(-80.0),
            lane_state: crate::types::LaneState::LeftDrift,
        };
        let source = Scripted(
            vec![Acquisition::Missed, Acquisition::Sample(sample), Acquisition::Missed].into(),
        );
        let mut runner: LaneRunner<_, _, Vec<u8>> =
            LaneRunner::new(source, NoTurnSignals, LaneDriftDetector::new(DriftConfig::default()));
        let sink = RecordingSink::default();
        let metrics = PipelineMetrics::new();

        assert_eq!(runner.tick(&sink, &metrics).await, TickOutcome::Skipped);
        assert_eq!(runner.detector().frames_processed(), 0);
        assert_eq!(runner.tick(&sink, &metrics).await, TickOutcome::Processed);
        assert_eq!(runner.tick(&sink, &metrics).await, TickOutcome::Skipped);
        assert_eq!(runner.tick(&sink, &metrics).await, TickOutcome::Finished);

        let summary = metrics.summary();
        assert_eq!(summary.lane_missed, 2);
        assert_eq!(summary.lane_ticks, 1);
    }

    #[tokio::test]
    async fn test_default_accel_scenario() {
        let source = SyntheticAccelSource::new(default_accel_scenario(), 20.0);
        let mut runner: BrakeRunner<_, Vec<u8>> =
            BrakeRunner::new(source, BrakeClassifier::new(BrakeConfig::default()));
        let sink = RecordingSink::default();
        let metrics = PipelineMetrics::new();

        runner.run(&sink, &metrics, 0).await;

        assert_eq!(
            kinds(&sink),
            vec![
                ViolationKind::ModerateBrake,
                ViolationKind::HardBrake,
                ViolationKind::BehaviorChange,
                ViolationKind::BehaviorChange,
            ]
        );
        match &sink.events.borrow()[3] {
            ViolationEvent::BehaviorChange(e) => {
                assert_eq!(e.class, BehaviorClass::Dangerous);
                assert_eq!(e.previous, Some(BehaviorClass::Aggressive));
            }
            other => panic!("unexpected {:?}", other),
        }

        let summary = runner.session().summary();
        assert_eq!(summary.total_samples, 466);
        assert_eq!(summary.classified_samples, 416);
        assert_eq!(summary.dominant_behavior, Some("Normal Driving"));
        assert_eq!(metrics.summary().brake_ticks, 466);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_loop() {
        let source = SyntheticAccelSource::new(
            vec![
                AccelSegment::new(1, 1.8, Some(BehaviorClass::Dangerous)),
                AccelSegment::new(200, 0.9, Some(BehaviorClass::Normal)),
                AccelSegment::new(1, 1.8, None),
            ],
            20.0,
        );
        let mut runner: BrakeRunner<_, Vec<u8>> =
            BrakeRunner::new(source, BrakeClassifier::new(BrakeConfig::default()));
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let metrics = PipelineMetrics::new();

        runner.run(&sink, &metrics, 0).await;

        let summary = metrics.summary();
        assert_eq!(summary.brake_ticks, 202);
        assert_eq!(summary.hard_brakes, 2);
        assert_eq!(summary.behavior_changes, 1);
        assert_eq!(summary.sink_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_loop_runs_on_interval() {
        let source = SyntheticAccelSource::new(vec![AccelSegment::new(5, 0.9, None)], 20.0);
        let mut runner: BrakeRunner<_, Vec<u8>> =
            BrakeRunner::new(source, BrakeClassifier::new(BrakeConfig::default()));
        let started = tokio::time::Instant::now();

        runner.run(&RecordingSink::default(), &PipelineMetrics::new(), 20).await;

        // First tick is immediate, then one per interval; the Exhausted
        // acquisition waits for a sixth tick
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
