//! Recorded controller input, replayed frame by frame.
//!
//! Used by the headless host to drive a script without a physical pad. Each
//! entry is one raw reading held for `repeat` frames; once the sequence runs
//! out the controller reports the last reading forever.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::config::ConfigError;
use crate::input::{Controller, RawControllerState, RELEASED_MASK};

#[derive(Debug, Deserialize, Clone)]
pub struct ReplaySequence {
    pub frames: Vec<ReplayFrame>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayFrame {
    #[serde(default = "default_buttons")]
    pub buttons: u32,
    #[serde(default)]
    pub joy_x: i32,
    #[serde(default)]
    pub joy_y: i32,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

impl ReplaySequence {
    pub fn expanded_states(&self) -> Vec<RawControllerState> {
        let mut out = Vec::new();
        for frame in &self.frames {
            for _ in 0..frame.repeat.max(1) {
                out.push(RawControllerState {
                    buttons: frame.buttons,
                    joy_x: frame.joy_x.clamp(-128, 127),
                    joy_y: frame.joy_y.clamp(-128, 127),
                });
            }
        }
        out
    }
}

/// Controller that plays back a fixed list of readings.
#[derive(Debug, Clone)]
pub struct ReplayController {
    states: Vec<RawControllerState>,
    cursor: usize,
}

impl ReplayController {
    pub fn new(states: Vec<RawControllerState>) -> Self {
        Self { states, cursor: 0 }
    }

    pub fn from_sequence(sequence: &ReplaySequence) -> Self {
        Self::new(sequence.expanded_states())
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.states.len()
    }
}

impl Controller for ReplayController {
    fn poll(&mut self) -> Option<RawControllerState> {
        let state = self
            .states
            .get(self.cursor)
            .or_else(|| self.states.last())
            .copied()
            .unwrap_or_default();
        if self.cursor < self.states.len() {
            self.cursor += 1;
        }
        Some(state)
    }
}

pub fn load_replay_from_path(path: &Path) -> Result<ReplaySequence, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let replay: ReplaySequence = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if replay.frames.is_empty() {
        return Err(ConfigError::Invalid("replay frames list is empty".to_string()));
    }
    Ok(replay)
}

const fn default_buttons() -> u32 {
    RELEASED_MASK
}

const fn default_repeat() -> u32 {
    1
}
