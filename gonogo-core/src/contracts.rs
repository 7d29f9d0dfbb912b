use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Snapshot offered to a responder at each phase of a trial.
///
/// Built fresh per phase and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    pub trial_id: Option<u64>,
    pub phase: String,
    pub condition_id: Option<String>,
    pub valid_keys: Vec<String>,
    pub deadline_s: Option<f64>,
    pub response_window_s: Option<f64>,
    pub block_id: Option<String>,
    pub stim_id: Option<String>,
    #[serde(default)]
    pub task_factors: BTreeMap<String, Value>,
}

impl Observation {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            ..Self::default()
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition_id = Some(condition.into());
        self
    }

    pub fn with_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.valid_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_deadline(mut self, deadline_s: f64) -> Self {
        self.deadline_s = Some(deadline_s);
        self
    }

    /// The authoritative response deadline: `deadline_s` wins over
    /// `response_window_s` when both are set.
    pub fn deadline(&self) -> Option<f64> {
        self.deadline_s.or(self.response_window_s)
    }

    /// Phase name, trimmed and lowercased for matching.
    pub fn normalized_phase(&self) -> String {
        self.phase.trim().to_lowercase()
    }

    pub fn normalized_condition(&self) -> String {
        self.condition_id
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }

    pub fn accepts(&self, key: &str) -> bool {
        self.valid_keys.iter().any(|k| k == key)
    }
}

/// A responder's reply to one observation. `key == None` means withhold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    pub key: Option<String>,
    pub rt_s: Option<f64>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl Action {
    pub fn press(key: impl Into<String>, rt_s: f64) -> Self {
        Self {
            key: Some(key.into()),
            rt_s: Some(rt_s.max(0.0)),
            meta: BTreeMap::new(),
        }
    }

    pub fn withhold() -> Self {
        Self::default()
    }

    pub fn with_meta(mut self, name: &str, value: impl Into<String>) -> Self {
        self.meta.insert(name.to_string(), value.into());
        self
    }

    pub fn is_withheld(&self) -> bool {
        self.key.is_none()
    }

    pub fn outcome(&self) -> Option<&str> {
        self.meta.get("outcome").map(String::as_str)
    }

    pub fn reason(&self) -> Option<&str> {
        self.meta.get("reason").map(String::as_str)
    }
}

/// Post-hoc scoring signal a session may send back after a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub trial_id: u64,
    pub condition: String,
    pub outcome: String,
    pub correct: bool,
}

/// Session-scoped context handed to a responder at session start.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    pub subject_id: String,
    pub session_id: String,
    pub task_name: String,
    pub seed: u64,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_prefers_explicit_deadline() {
        let mut obs = Observation::new("target");
        assert_eq!(obs.deadline(), None);

        obs.response_window_s = Some(1.5);
        assert_eq!(obs.deadline(), Some(1.5));

        obs.deadline_s = Some(0.8);
        assert_eq!(obs.deadline(), Some(0.8));
    }

    #[test]
    fn phase_and_condition_are_normalized() {
        let obs = Observation::new("  Target ").with_condition("NoGo ");
        assert_eq!(obs.normalized_phase(), "target");
        assert_eq!(obs.normalized_condition(), "nogo");
        assert_eq!(Observation::new("x").normalized_condition(), "");
    }

    #[test]
    fn press_never_carries_negative_latency() {
        let action = Action::press("space", -0.2);
        assert_eq!(action.rt_s, Some(0.0));
        assert!(!action.is_withheld());
    }

    #[test]
    fn meta_tags_are_readable() {
        let action = Action::withhold()
            .with_meta("outcome", "miss")
            .with_meta("reason", "no_valid_key");
        assert!(action.is_withheld());
        assert_eq!(action.outcome(), Some("miss"));
        assert_eq!(action.reason(), Some("no_valid_key"));
    }
}
