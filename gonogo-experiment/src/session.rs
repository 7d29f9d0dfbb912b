use gonogo_core::{Observation, SessionInfo, StimulusProvider, StimulusType, TrialRecord};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::block::{Block, BlockSummary};
use crate::config::TaskConfig;
use crate::ids::TrialIdScope;
use crate::runtime::{Runtime, ShowRequest};
use crate::trial::TaskEnv;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot write results to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write result rows: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub info: SessionInfo,
    pub first_trial_id: u64,
    pub blocks: Vec<BlockSummary>,
    pub rows: Vec<TrialRecord>,
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

impl SessionReport {
    /// Sorted union of the fields recorded by any trial.
    pub fn columns(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.rows.iter().flat_map(|row| row.keys()).collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Writes the rows as CSV with one column per recorded field. Fields a
    /// trial never reached are left blank.
    pub fn write_rows(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        let io_err = |source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = File::create(path).map_err(io_err)?;
        let mut writer = csv::Writer::from_writer(file);

        let columns = self.columns();
        writer.write_record(&columns)?;
        for row in &self.rows {
            writer.write_record(columns.iter().map(|name| cell(row.get(name))))?;
        }
        writer.flush().map_err(io_err)?;

        info!(path = %path.display(), rows = self.rows.len(), "results saved");
        Ok(())
    }
}

/// Instruction screen, blocks with break screens, goodbye.
pub struct Session<'a> {
    config: &'a TaskConfig,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a TaskConfig) -> Self {
        Self { config }
    }

    fn continue_screen<R: Runtime + ?Sized>(
        &self,
        runtime: &mut R,
        phase: &str,
        stim_id: &str,
        stimulus: Option<StimulusType>,
    ) {
        let mut observation = Observation::new(phase)
            .with_keys(self.config.task.continue_keys.iter().cloned());
        observation.stim_id = Some(stim_id.to_string());
        let key = runtime.wait_and_continue(stimulus.as_ref(), &observation);
        info!(phase, key = ?key, "continue screen done");
    }

    fn countdown<R: Runtime + ?Sized>(&self, runtime: &mut R) {
        let duration_s = self.config.task.countdown_duration;
        if duration_s <= 0.0 {
            return;
        }
        let stimulus = StimulusType::text(format!("{}", duration_s.ceil()));
        let request = ShowRequest {
            label: "countdown",
            stimulus: Some(&stimulus),
            duration_s,
            onset_trigger: None,
        };
        runtime.show(&request, &Observation::new("countdown"));
    }

    pub fn run<R: Runtime + ?Sized>(&self, runtime: &mut R) -> SessionReport {
        let settings = &self.config.task;
        let stimuli = &self.config.stimuli;
        let env = TaskEnv {
            settings,
            triggers: &self.config.triggers,
            stimuli,
        };
        let info = self.config.session_info();
        let ids = TrialIdScope::begin();
        info!(
            subject = %info.subject_id,
            session = %info.session_id,
            blocks = settings.total_blocks,
            trials_per_block = settings.trial_per_block,
            "session started"
        );

        runtime.start_session(&info);
        runtime.trigger(self.config.triggers.get("exp_onset"));
        self.continue_screen(
            runtime,
            "instruction_text",
            "instruction_text",
            stimuli.get("instruction_text"),
        );

        let mut rows = Vec::new();
        let mut blocks = Vec::with_capacity(settings.total_blocks);
        for block_idx in 0..settings.total_blocks {
            self.countdown(runtime);
            let block = Block::generate(block_idx, settings);
            let block_rows = block.run(runtime, &env);
            let summary = BlockSummary::from_rows(&block.context.block_id, &block_rows);
            info!(
                block = %summary.block_id,
                go_accuracy = summary.go_accuracy,
                nogo_accuracy = summary.nogo_accuracy,
                "block complete"
            );
            let fields = summary.break_fields(block_idx + 1, settings.total_blocks);
            self.continue_screen(
                runtime,
                "block",
                "block_break",
                stimuli.get_and_format("block_break", &fields),
            );
            rows.extend(block_rows);
            blocks.push(summary);
        }

        self.continue_screen(runtime, "goodbye", "good_bye", stimuli.get("good_bye"));
        runtime.trigger(self.config.triggers.get("exp_end"));
        runtime.end_session();
        let first_trial_id = ids.first();
        ids.end();

        SessionReport {
            info,
            first_trial_id,
            blocks,
            rows,
        }
    }
}
