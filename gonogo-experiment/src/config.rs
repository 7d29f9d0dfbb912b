use gonogo_core::{SessionInfo, StimulusBank, StimulusProvider};
use gonogo_sim::SamplerConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::block::ConditionOrder;
use crate::trigger::TriggerMap;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Condition label and its relative frequency within a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionWeight {
    pub label: String,
    pub weight: u32,
}

/// Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub task_name: String,
    pub fixation_duration: f64,
    pub go_duration: f64,
    pub no_response_feedback_duration: f64,
    pub nogo_error_feedback_duration: f64,
    pub countdown_duration: f64,
    pub key_list: Vec<String>,
    pub continue_keys: Vec<String>,
    pub total_blocks: usize,
    pub trial_per_block: usize,
    pub conditions: Vec<ConditionWeight>,
    pub order: ConditionOrder,
    pub seed: u64,
    pub res_file: PathBuf,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            task_name: "go_nogo".to_string(),
            fixation_duration: 0.5,
            go_duration: 1.0,
            no_response_feedback_duration: 0.8,
            nogo_error_feedback_duration: 0.8,
            countdown_duration: 3.0,
            key_list: vec!["space".to_string()],
            continue_keys: vec!["space".to_string()],
            total_blocks: 2,
            trial_per_block: 40,
            conditions: vec![
                ConditionWeight {
                    label: "go".to_string(),
                    weight: 3,
                },
                ConditionWeight {
                    label: "nogo".to_string(),
                    weight: 1,
                },
            ],
            order: ConditionOrder::Random,
            seed: 2024,
            res_file: PathBuf::from("go_nogo_results.csv"),
        }
    }
}

impl TaskSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("fixation_duration", self.fixation_duration),
            ("go_duration", self.go_duration),
            (
                "no_response_feedback_duration",
                self.no_response_feedback_duration,
            ),
            ("nogo_error_feedback_duration", self.nogo_error_feedback_duration),
        ];
        for (field, value) in durations {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a positive number of seconds, got {value}"),
                });
            }
        }
        if !self.countdown_duration.is_finite() || self.countdown_duration < 0.0 {
            return Err(ConfigError::Invalid {
                field: "countdown_duration",
                reason: format!("must not be negative, got {}", self.countdown_duration),
            });
        }
        if self.key_list.is_empty() {
            return Err(ConfigError::Invalid {
                field: "key_list",
                reason: "at least one response key is required".to_string(),
            });
        }
        if self.conditions.iter().all(|c| c.weight == 0) {
            return Err(ConfigError::Invalid {
                field: "conditions",
                reason: "at least one condition needs a non-zero weight".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectInfo {
    pub subject_id: String,
    pub session_id: String,
    pub extra: BTreeMap<String, String>,
}

impl Default for SubjectInfo {
    fn default() -> Self {
        Self {
            subject_id: "sim".to_string(),
            session_id: "001".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

/// The whole task config document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub task: TaskSettings,
    pub triggers: TriggerMap,
    pub stimuli: StimulusBank,
    pub responder: SamplerConfig,
    pub subject: SubjectInfo,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            task: TaskSettings::default(),
            triggers: TriggerMap::default(),
            stimuli: StimulusBank::standard(),
            responder: SamplerConfig::default(),
            subject: SubjectInfo::default(),
        }
    }
}

impl TaskConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parses and validates. Standard stimuli missing from the document are
    /// filled in from the built-in bank.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: TaskConfig = serde_json::from_str(text)?;
        config.fill_missing_stimuli();
        config.task.validate()?;
        Ok(config)
    }

    fn fill_missing_stimuli(&mut self) {
        let standard = StimulusBank::standard();
        for name in [
            "fixation",
            "go",
            "nogo",
            "no_response_feedback",
            "nogo_error_feedback",
            "instruction_text",
            "block_break",
            "good_bye",
        ] {
            if !self.stimuli.contains(name) {
                if let Some(stim) = standard.get(name) {
                    warn!(stimulus = name, "stimulus missing from config, using built-in default");
                    self.stimuli.insert(name, stim);
                }
            }
        }
    }

    pub fn session_info(&self) -> SessionInfo {
        SessionInfo {
            subject_id: self.subject.subject_id.clone(),
            session_id: self.subject.session_id.clone(),
            task_name: self.task.task_name.clone(),
            seed: self.task.seed,
            extra: self.subject.extra.clone(),
        }
    }
}
