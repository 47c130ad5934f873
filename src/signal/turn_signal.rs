// src/signal/turn_signal.rs

use crate::types::{Side, TurnSignalWindow};

/// Blinker state sampled once per lane tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnSignalState {
    pub left: bool,
    pub right: bool,
}

/// Turn-signal capability. Vehicles without blinker wiring use `NoTurnSignals`.
pub trait TurnSignalInput {
    fn read(&mut self, timestamp_ms: f64) -> TurnSignalState;
}

impl<T: TurnSignalInput + ?Sized> TurnSignalInput for Box<T> {
    fn read(&mut self, timestamp_ms: f64) -> TurnSignalState {
        (**self).read(timestamp_ms)
    }
}

/// No blinker hardware: both signals always read inactive.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTurnSignals;

impl TurnSignalInput for NoTurnSignals {
    fn read(&mut self, _timestamp_ms: f64) -> TurnSignalState {
        TurnSignalState::default()
    }
}

/// Blinker activity from configured time windows (replay and simulation).
#[derive(Debug, Clone, Default)]
pub struct ScriptedTurnSignals {
    windows: Vec<TurnSignalWindow>,
}

impl ScriptedTurnSignals {
    pub fn new(windows: Vec<TurnSignalWindow>) -> Self {
        Self { windows }
    }

    fn active(&self, side: Side, timestamp_ms: f64) -> bool {
        self.windows
            .iter()
            .any(|w| w.side == side && timestamp_ms >= w.from_ms && timestamp_ms < w.to_ms)
    }
}

impl TurnSignalInput for ScriptedTurnSignals {
    fn read(&mut self, timestamp_ms: f64) -> TurnSignalState {
        TurnSignalState {
            left: self.active(Side::Left, timestamp_ms),
            right: self.active(Side::Right, timestamp_ms),
        }
    }
}
