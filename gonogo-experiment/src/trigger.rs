use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Named trigger codes from the task config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerMap {
    codes: HashMap<String, u8>,
}

impl TriggerMap {
    pub fn empty() -> Self {
        Self {
            codes: HashMap::new(),
        }
    }

    /// Unknown names mean "no trigger", never an error.
    pub fn get(&self, name: &str) -> Option<u8> {
        self.codes.get(name).copied()
    }
}

impl Default for TriggerMap {
    fn default() -> Self {
        let codes = [
            ("exp_onset", 98),
            ("exp_end", 99),
            ("block_onset", 100),
            ("block_end", 101),
            ("fixation_onset", 1),
            ("go_onset", 10),
            ("go_response", 11),
            ("go_miss", 12),
            ("nogo_onset", 20),
            ("nogo_response", 21),
            ("nogo_miss", 22),
            ("no_response_feedback_onset", 30),
            ("nogo_error_feedback_onset", 31),
        ];
        Self {
            codes: codes
                .into_iter()
                .map(|(name, code)| (name.to_string(), code))
                .collect(),
        }
    }
}

/// Outgoing trigger channel. `None` is a no-op.
pub trait TriggerSink {
    fn send(&mut self, code: Option<u8>, at_s: f64);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullTriggers;

impl TriggerSink for NullTriggers {
    fn send(&mut self, _code: Option<u8>, _at_s: f64) {}
}

/// Keeps every sent code with its session time.
#[derive(Debug, Clone, Default)]
pub struct RecordingTriggers {
    pub sent: Vec<(f64, u8)>,
}

impl RecordingTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn codes(&self) -> Vec<u8> {
        self.sent.iter().map(|(_, code)| *code).collect()
    }
}

impl TriggerSink for RecordingTriggers {
    fn send(&mut self, code: Option<u8>, at_s: f64) {
        if let Some(code) = code {
            debug!(code, at_s, "trigger");
            self.sent.push((at_s, code));
        }
    }
}

impl<T: TriggerSink + ?Sized> TriggerSink for Box<T> {
    fn send(&mut self, code: Option<u8>, at_s: f64) {
        (**self).send(code, at_s)
    }
}
