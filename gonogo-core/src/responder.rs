use crate::contracts::{Action, Feedback, Observation, SessionInfo};
use crate::random::RandomSource;

/// Decision policy standing in for the participant.
///
/// Human-interactive and simulated responders implement the same four
/// operations, so the trial driver never knows which one is attached.
pub trait Responder: Send {
    /// Binds the session's randomness. No decisions draw before this call.
    fn start_session(&mut self, session: &SessionInfo, rng: Box<dyn RandomSource>);

    fn act(&mut self, observation: &Observation) -> Action;

    fn on_feedback(&mut self, _feedback: &Feedback) {}

    fn end_session(&mut self) {}
}

impl<T: Responder + ?Sized> Responder for Box<T> {
    fn start_session(&mut self, session: &SessionInfo, rng: Box<dyn RandomSource>) {
        (**self).start_session(session, rng)
    }

    fn act(&mut self, observation: &Observation) -> Action {
        (**self).act(observation)
    }

    fn on_feedback(&mut self, feedback: &Feedback) {
        (**self).on_feedback(feedback)
    }

    fn end_session(&mut self) {
        (**self).end_session()
    }
}
