pub mod block;
pub mod config;
pub mod ids;
pub mod runtime;
pub mod session;
pub mod trial;
pub mod trigger;

pub use block::{Block, BlockSummary, ConditionOrder, feedback_for, generate_conditions};
pub use config::{ConditionWeight, ConfigError, SubjectInfo, TaskConfig, TaskSettings};
pub use ids::{TrialIdScope, next_trial_id};
pub use runtime::{
    CaptureOutcome, CaptureRequest, ResponderRuntime, Response, Runtime, ShowOutcome, ShowRequest,
    validate_action,
};
pub use session::{PersistError, Session, SessionReport};
pub use trial::{BlockContext, PhaseContext, TaskEnv, build_observation, run_trial};
pub use trigger::{NullTriggers, RecordingTriggers, TriggerMap, TriggerSink};
