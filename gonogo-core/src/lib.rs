pub mod contracts;
pub mod phase;
pub mod random;
pub mod responder;
pub mod stimulus;
pub mod trial;

pub use contracts::{Action, Feedback, Observation, SessionInfo};
pub use phase::{Condition, TrialPhase, CONTINUE_PHASES, DECISION_PHASES};
pub use random::{RandomSource, RngSource};
pub use responder::Responder;
pub use stimulus::{ArrowDirection, StimulusBank, StimulusProvider, StimulusType};
pub use trial::{TrialOutcome, TrialRecord};
