use gonogo_core::{
    Condition, Observation, StimulusProvider, StimulusType, TrialOutcome, TrialPhase, TrialRecord,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::TaskSettings;
use crate::ids::next_trial_id;
use crate::runtime::{CaptureOutcome, CaptureRequest, Runtime, ShowOutcome, ShowRequest};
use crate::trigger::TriggerMap;

/// Block a trial belongs to; copied into every observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockContext {
    pub block_id: String,
    pub block_idx: usize,
}

/// Read-only task collaborators a trial needs.
pub struct TaskEnv<'a, S: StimulusProvider + ?Sized> {
    pub settings: &'a TaskSettings,
    pub triggers: &'a TriggerMap,
    pub stimuli: &'a S,
}

/// Everything one phase needs, passed explicitly from step to step.
#[derive(Debug, Clone)]
pub struct PhaseContext<'a> {
    pub trial_id: u64,
    pub phase: TrialPhase,
    pub condition: &'a str,
    pub block: &'a BlockContext,
    pub duration_s: f64,
    pub valid_keys: &'a [String],
}

struct PhaseTriggers {
    onset: Option<u8>,
    response: Option<u8>,
    timeout: Option<u8>,
}

fn phase_duration(settings: &TaskSettings, phase: TrialPhase) -> f64 {
    match phase {
        TrialPhase::PreTargetFixation => settings.fixation_duration,
        TrialPhase::GoResponseWindow | TrialPhase::NogoInhibitionWindow => settings.go_duration,
        TrialPhase::NoResponseFeedback => settings.no_response_feedback_duration,
        TrialPhase::NogoErrorFeedback => settings.nogo_error_feedback_duration,
    }
}

fn phase_triggers(triggers: &TriggerMap, phase: TrialPhase) -> PhaseTriggers {
    let label = phase.unit_label();
    let (response, timeout) = match phase {
        TrialPhase::GoResponseWindow => (triggers.get("go_response"), triggers.get("go_miss")),
        TrialPhase::NogoInhibitionWindow => {
            (triggers.get("nogo_response"), triggers.get("nogo_miss"))
        }
        _ => (None, None),
    };
    PhaseTriggers {
        onset: triggers.get(&format!("{label}_onset")),
        response,
        timeout,
    }
}

/// Observation describing the phase about to run.
pub fn build_observation(ctx: &PhaseContext<'_>) -> Observation {
    let mut obs = Observation::new(ctx.phase.name())
        .with_condition(ctx.condition)
        .with_keys(ctx.valid_keys.iter().cloned())
        .with_deadline(ctx.duration_s);
    obs.trial_id = Some(ctx.trial_id);
    obs.block_id = Some(ctx.block.block_id.clone());
    obs.stim_id = Some(ctx.phase.stimulus_name().to_string());
    obs.task_factors.insert("condition".to_string(), json!(ctx.condition));
    obs.task_factors.insert("stage".to_string(), json!(ctx.phase.name()));
    obs.task_factors.insert("block_idx".to_string(), json!(ctx.block.block_idx));
    obs
}

fn record_show(record: &mut TrialRecord, ctx: &PhaseContext<'_>, onset_trigger: Option<u8>, outcome: &ShowOutcome) {
    let label = ctx.phase.unit_label();
    record.insert(format!("{label}_onset_time"), outcome.onset_s);
    record.insert(format!("{label}_close_time"), outcome.close_s);
    record.insert(format!("{label}_duration"), ctx.duration_s);
    record.insert(format!("{label}_onset_trigger"), onset_trigger.map_or(Value::Null, Value::from));
}

fn record_capture(record: &mut TrialRecord, ctx: &PhaseContext<'_>, onset_trigger: Option<u8>, outcome: &CaptureOutcome) {
    let label = ctx.phase.unit_label();
    record_show(
        record,
        ctx,
        onset_trigger,
        &ShowOutcome {
            onset_s: outcome.onset_s,
            close_s: outcome.close_s,
        },
    );
    let response = outcome.response.as_ref();
    record.insert(format!("{label}_response"), response.is_some());
    record.insert(format!("{label}_hit"), response.is_some());
    record.insert(
        format!("{label}_key_press"),
        response.map_or(Value::Null, |r| Value::from(r.key.clone())),
    );
    record.insert(
        format!("{label}_rt"),
        response.map_or(Value::Null, |r| Value::from(r.rt_s)),
    );
}

fn show_phase<R: Runtime + ?Sized>(
    runtime: &mut R,
    ctx: &PhaseContext<'_>,
    stimulus: Option<&StimulusType>,
    triggers: &PhaseTriggers,
    record: &mut TrialRecord,
) {
    let observation = build_observation(ctx);
    let request = ShowRequest {
        label: ctx.phase.unit_label(),
        stimulus,
        duration_s: ctx.duration_s,
        onset_trigger: triggers.onset,
    };
    let outcome = runtime.show(&request, &observation);
    record_show(record, ctx, triggers.onset, &outcome);
}

fn capture_phase<R: Runtime + ?Sized>(
    runtime: &mut R,
    ctx: &PhaseContext<'_>,
    stimulus: Option<&StimulusType>,
    triggers: &PhaseTriggers,
    record: &mut TrialRecord,
) -> bool {
    let observation = build_observation(ctx);
    let request = CaptureRequest {
        label: ctx.phase.unit_label(),
        stimulus,
        keys: ctx.valid_keys,
        duration_s: ctx.duration_s,
        onset_trigger: triggers.onset,
        response_trigger: triggers.response,
        timeout_trigger: triggers.timeout,
        terminate_on_response: true,
    };
    let outcome = runtime.capture(&request, &observation);
    record_capture(record, ctx, triggers.onset, &outcome);
    outcome.response.is_some()
}

/// Runs one Go/No-Go trial to completion.
///
/// Fixation, then the go or no-go window picked by `condition`, then the
/// feedback screen for a go miss or a no-go press. Never fails: malformed
/// input degrades to "no response" and the record is always complete.
pub fn run_trial<R, S>(
    runtime: &mut R,
    env: &TaskEnv<'_, S>,
    condition: &str,
    block: &BlockContext,
) -> TrialRecord
where
    R: Runtime + ?Sized,
    S: StimulusProvider + ?Sized,
{
    let trial_id = next_trial_id();
    let branch = Condition::from_label(condition);
    let mut record = TrialRecord::new(condition);
    record.insert("trial_id", trial_id);
    info!(trial_id, condition, block = %block.block_id, "trial started");

    let mut responded = false;
    let mut phase = Some(TrialPhase::first());
    while let Some(current) = phase {
        let ctx = PhaseContext {
            trial_id,
            phase: current,
            condition,
            block,
            duration_s: phase_duration(env.settings, current),
            valid_keys: &env.settings.key_list,
        };
        let stimulus = env.stimuli.get(current.stimulus_name());
        if stimulus.is_none() {
            debug!(stimulus = current.stimulus_name(), "no stimulus registered");
        }
        let triggers = phase_triggers(env.triggers, current);

        if current.allows_input() {
            responded = capture_phase(runtime, &ctx, stimulus.as_ref(), &triggers, &mut record);
        } else {
            show_phase(runtime, &ctx, stimulus.as_ref(), &triggers, &mut record);
        }
        debug!(trial_id, phase = current.name(), responded, "phase done");
        phase = current.next(branch, responded);
    }

    let outcome = TrialOutcome::score(branch, responded);
    record.insert("outcome", outcome.as_str());
    record.insert("correct", outcome.is_correct());
    info!(trial_id, outcome = outcome.as_str(), "trial complete");
    record
}
