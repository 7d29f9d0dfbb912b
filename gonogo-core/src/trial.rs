use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::phase::Condition;

/// Scored result of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialOutcome {
    Hit,
    Miss,
    FalseAlarm,
    CorrectWithhold,
}

impl TrialOutcome {
    pub fn score(condition: Condition, responded: bool) -> Self {
        match (condition, responded) {
            (Condition::Go, true) => TrialOutcome::Hit,
            (Condition::Go, false) => TrialOutcome::Miss,
            (Condition::NoGo, true) => TrialOutcome::FalseAlarm,
            (Condition::NoGo, false) => TrialOutcome::CorrectWithhold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrialOutcome::Hit => "hit",
            TrialOutcome::Miss => "miss",
            TrialOutcome::FalseAlarm => "false_alarm",
            TrialOutcome::CorrectWithhold => "correct_withhold",
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, TrialOutcome::Hit | TrialOutcome::CorrectWithhold)
    }
}

/// Flat field map accumulated across a trial's phases; one output row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialRecord {
    fields: BTreeMap<String, Value>,
}

impl TrialRecord {
    /// The condition label is stored trimmed and lowercased, the same way
    /// the trial machine and responders read it.
    pub fn new(condition: &str) -> Self {
        let mut record = Self::default();
        record.insert("condition", condition.trim().to_lowercase());
        record
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Missing or non-boolean fields read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    pub fn condition(&self) -> &str {
        self.text("condition").unwrap_or_default()
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.fields.keys().any(|k| k.starts_with(prefix))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_all_four_cells() {
        assert_eq!(TrialOutcome::score(Condition::Go, true), TrialOutcome::Hit);
        assert_eq!(TrialOutcome::score(Condition::Go, false), TrialOutcome::Miss);
        assert_eq!(TrialOutcome::score(Condition::NoGo, true), TrialOutcome::FalseAlarm);
        assert_eq!(
            TrialOutcome::score(Condition::NoGo, false),
            TrialOutcome::CorrectWithhold
        );
        assert!(TrialOutcome::CorrectWithhold.is_correct());
        assert!(!TrialOutcome::FalseAlarm.is_correct());
    }

    #[test]
    fn record_always_has_condition() {
        let record = TrialRecord::new("nogo");
        assert_eq!(record.condition(), "nogo");
        assert!(!record.flag("nogo_hit"));
    }

    #[test]
    fn condition_label_is_normalized() {
        assert_eq!(TrialRecord::new(" GO ").condition(), "go");
        assert_eq!(TrialRecord::new("NoGo").condition(), "nogo");
    }

    #[test]
    fn serializes_as_a_flat_object() {
        let mut record = TrialRecord::new("go");
        record.insert("go_hit", true);
        record.insert("go_rt", 0.31);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["go_hit"], Value::Bool(true));
        assert_eq!(json["condition"], Value::from("go"));
        assert!(record.has_prefix("go_"));
        assert!(!record.has_prefix("no_response_feedback_"));
    }
}
