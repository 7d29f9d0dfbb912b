use gonogo_core::{Feedback, StimulusProvider, TrialRecord};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::config::{ConditionWeight, TaskSettings};
use crate::runtime::Runtime;
use crate::trial::{run_trial, BlockContext, TaskEnv};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOrder {
    #[default]
    Random,
    Sequential,
}

/// Condition labels for one block, in proportion to their weights.
///
/// Rounding leftovers go to the conditions in listed order.
pub fn generate_conditions<R: Rng + ?Sized>(
    n_trials: usize,
    weights: &[ConditionWeight],
    order: ConditionOrder,
    rng: &mut R,
) -> Vec<String> {
    let total: u64 = weights.iter().map(|c| c.weight as u64).sum();
    if total == 0 || n_trials == 0 {
        return Vec::new();
    }

    let mut counts: Vec<usize> = weights
        .iter()
        .map(|c| (n_trials as u64 * c.weight as u64 / total) as usize)
        .collect();
    let mut remainder = n_trials - counts.iter().sum::<usize>();
    let weighted: Vec<usize> = (0..weights.len()).filter(|&i| weights[i].weight > 0).collect();
    for &i in weighted.iter().cycle() {
        if remainder == 0 {
            break;
        }
        counts[i] += 1;
        remainder -= 1;
    }

    let mut sequence: Vec<String> = weights
        .iter()
        .zip(&counts)
        .flat_map(|(c, &n)| std::iter::repeat_n(c.label.clone(), n))
        .collect();
    if order == ConditionOrder::Random {
        sequence.shuffle(rng);
    }
    sequence
}

/// Scoring signal for the responder, read back from a finished row.
pub fn feedback_for(row: &TrialRecord) -> Feedback {
    Feedback {
        trial_id: row.get("trial_id").and_then(|v| v.as_u64()).unwrap_or_default(),
        condition: row.condition().to_string(),
        outcome: row.text("outcome").unwrap_or("unknown").to_string(),
        correct: row.flag("correct"),
    }
}

fn ratio(k: usize, n: usize) -> f64 {
    if n > 0 { k as f64 / n as f64 } else { 0.0 }
}

/// Per-block accuracy shown on the break screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub block_id: String,
    pub n_go: usize,
    pub go_hits: usize,
    pub go_accuracy: f64,
    pub n_nogo: usize,
    pub nogo_correct: usize,
    pub nogo_accuracy: f64,
}

impl BlockSummary {
    pub fn from_rows(block_id: &str, rows: &[TrialRecord]) -> Self {
        let go: Vec<&TrialRecord> = rows.iter().filter(|r| r.condition() == "go").collect();
        let nogo: Vec<&TrialRecord> = rows.iter().filter(|r| r.condition() == "nogo").collect();
        let go_hits = go.iter().filter(|r| r.flag("go_hit")).count();
        let nogo_correct = nogo.iter().filter(|r| !r.flag("nogo_hit")).count();
        Self {
            block_id: block_id.to_string(),
            n_go: go.len(),
            go_hits,
            go_accuracy: ratio(go_hits, go.len()),
            n_nogo: nogo.len(),
            nogo_correct,
            nogo_accuracy: ratio(nogo_correct, nogo.len()),
        }
    }

    /// Placeholder values for the `block_break` stimulus.
    pub fn break_fields(&self, block_num: usize, total_blocks: usize) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("block_num".to_string(), block_num.to_string()),
            ("total_blocks".to_string(), total_blocks.to_string()),
            ("go_accuracy".to_string(), format!("{:.2}", self.go_accuracy)),
            ("nogo_accuracy".to_string(), format!("{:.2}", self.nogo_accuracy)),
        ])
    }
}

/// One block: a fixed condition sequence run trial by trial.
#[derive(Debug, Clone)]
pub struct Block {
    pub context: BlockContext,
    pub conditions: Vec<String>,
}

impl Block {
    pub fn new(block_idx: usize, conditions: Vec<String>) -> Self {
        Self {
            context: BlockContext {
                block_id: format!("block_{block_idx}"),
                block_idx,
            },
            conditions,
        }
    }

    /// Sequence drawn from a per-block rng so blocks replay independently.
    pub fn generate(block_idx: usize, settings: &TaskSettings) -> Self {
        let mut rng = StdRng::seed_from_u64(settings.seed.wrapping_add(block_idx as u64 + 1));
        let conditions = generate_conditions(
            settings.trial_per_block,
            &settings.conditions,
            settings.order,
            &mut rng,
        );
        Self::new(block_idx, conditions)
    }

    pub fn run<R, S>(&self, runtime: &mut R, env: &TaskEnv<'_, S>) -> Vec<TrialRecord>
    where
        R: Runtime + ?Sized,
        S: StimulusProvider + ?Sized,
    {
        info!(block = %self.context.block_id, trials = self.conditions.len(), "block started");
        runtime.trigger(env.triggers.get("block_onset"));
        let mut rows = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            let mut row = run_trial(&mut *runtime, env, condition, &self.context);
            row.insert("block_id", self.context.block_id.clone());
            row.insert("block_idx", self.context.block_idx);
            runtime.feedback(&feedback_for(&row));
            rows.push(row);
        }
        runtime.trigger(env.triggers.get("block_end"));
        rows
    }
}
