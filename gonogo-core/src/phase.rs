use serde::{Deserialize, Serialize};

/// Screens that only wait for a key to move on.
pub const CONTINUE_PHASES: [&str; 4] = ["instruction_text", "block", "goodbye", "block_feedback"];

/// Phases in which a responder decides whether to press or withhold.
pub const DECISION_PHASES: [&str; 3] = ["target", "go_response_window", "nogo_inhibition_window"];

/// Experimental condition assigned to a trial by the block sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Go,
    NoGo,
}

impl Condition {
    /// Anything other than `go` runs the inhibition branch.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("go") {
            Condition::Go
        } else {
            Condition::NoGo
        }
    }
}

/// Phases of a single Go/No-Go trial.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialPhase {
    PreTargetFixation,
    GoResponseWindow,
    NogoInhibitionWindow,
    NoResponseFeedback,
    NogoErrorFeedback,
}

impl TrialPhase {
    pub fn first() -> Self {
        TrialPhase::PreTargetFixation
    }

    /// Name carried in observations.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreTargetFixation => "pre_target_fixation",
            Self::GoResponseWindow => "go_response_window",
            Self::NogoInhibitionWindow => "nogo_inhibition_window",
            Self::NoResponseFeedback => "no_response_feedback",
            Self::NogoErrorFeedback => "nogo_error_feedback",
        }
    }

    /// Prefix of the fields this phase writes into the trial record.
    pub fn unit_label(&self) -> &'static str {
        match self {
            Self::PreTargetFixation => "fixation",
            Self::GoResponseWindow => "go",
            Self::NogoInhibitionWindow => "nogo",
            Self::NoResponseFeedback => "no_response_feedback",
            Self::NogoErrorFeedback => "nogo_error_feedback",
        }
    }

    /// Stimulus shown during the phase.
    pub fn stimulus_name(&self) -> &'static str {
        match self {
            Self::PreTargetFixation => "fixation",
            Self::GoResponseWindow => "go",
            Self::NogoInhibitionWindow => "nogo",
            Self::NoResponseFeedback => "no_response_feedback",
            Self::NogoErrorFeedback => "nogo_error_feedback",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        use TrialPhase::*;
        [
            PreTargetFixation,
            GoResponseWindow,
            NogoInhibitionWindow,
            NoResponseFeedback,
            NogoErrorFeedback,
        ]
        .into_iter()
        .find(|phase| phase.name() == name)
    }

    pub fn allows_input(&self) -> bool {
        matches!(self, Self::GoResponseWindow | Self::NogoInhibitionWindow)
    }

    pub fn is_feedback(&self) -> bool {
        matches!(self, Self::NoResponseFeedback | Self::NogoErrorFeedback)
    }

    /// Transition table. `responded` is only consulted when leaving a
    /// response window.
    pub fn next(&self, condition: Condition, responded: bool) -> Option<Self> {
        use TrialPhase::*;
        match self {
            PreTargetFixation => Some(match condition {
                Condition::Go => GoResponseWindow,
                Condition::NoGo => NogoInhibitionWindow,
            }),
            GoResponseWindow => (!responded).then_some(NoResponseFeedback),
            NogoInhibitionWindow => responded.then_some(NogoErrorFeedback),
            NoResponseFeedback | NogoErrorFeedback => None,
        }
    }
}
