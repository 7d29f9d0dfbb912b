use gonogo_core::{Action, Feedback, Observation, Responder, RngSource, SessionInfo, StimulusType};
use gonogo_timing::Timer;
use std::time::Duration;
use tracing::{debug, trace};

use crate::trigger::TriggerSink;

/// Present a stimulus for a fixed time.
#[derive(Debug, Clone)]
pub struct ShowRequest<'a> {
    pub label: &'a str,
    pub stimulus: Option<&'a StimulusType>,
    pub duration_s: f64,
    pub onset_trigger: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShowOutcome {
    pub onset_s: f64,
    pub close_s: f64,
}

/// Present a stimulus and wait for one of `keys` for at most `duration_s`.
#[derive(Debug, Clone)]
pub struct CaptureRequest<'a> {
    pub label: &'a str,
    pub stimulus: Option<&'a StimulusType>,
    pub keys: &'a [String],
    pub duration_s: f64,
    pub onset_trigger: Option<u8>,
    pub response_trigger: Option<u8>,
    pub timeout_trigger: Option<u8>,
    pub terminate_on_response: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub key: String,
    pub rt_s: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOutcome {
    pub onset_s: f64,
    pub close_s: f64,
    pub response: Option<Response>,
}

/// Display and input surface the trial driver runs against.
pub trait Runtime {
    fn show(&mut self, request: &ShowRequest<'_>, observation: &Observation) -> ShowOutcome;

    fn capture(&mut self, request: &CaptureRequest<'_>, observation: &Observation) -> CaptureOutcome;

    /// Shows a screen until a valid key arrives. Returns the key, or `None`
    /// when no key could be obtained.
    fn wait_and_continue(
        &mut self,
        stimulus: Option<&StimulusType>,
        observation: &Observation,
    ) -> Option<String>;

    fn trigger(&mut self, code: Option<u8>);

    fn start_session(&mut self, _session: &SessionInfo) {}

    fn feedback(&mut self, _feedback: &Feedback) {}

    fn end_session(&mut self) {}
}

/// Negative and NaN become zero; values past `Duration::MAX` saturate.
fn secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s.max(0.0)).unwrap_or(Duration::MAX)
}

/// Turns a responder's action into a registered response, or explains why
/// it counts as no response.
pub fn validate_action(action: &Action, keys: &[String], window_s: f64) -> Result<Response, &'static str> {
    let Some(key) = action.key.as_ref() else {
        return Err("withheld");
    };
    if !keys.iter().any(|k| k == key) {
        return Err("key not in valid set");
    }
    let rt_s = match action.rt_s {
        Some(rt) if rt.is_finite() && rt >= 0.0 => rt,
        _ => return Err("missing or invalid latency"),
    };
    if rt_s > window_s {
        return Err("response after window closed");
    }
    Ok(Response {
        key: key.clone(),
        rt_s,
    })
}

/// Runtime whose input comes from an attached `Responder`.
///
/// Waiting happens on the timer, so a `SimulatedTimer` runs a whole session
/// instantly while a `HighPrecisionTimer` runs it in real time.
pub struct ResponderRuntime<T, G>
where
    T: Timer<Timestamp = u64>,
    G: TriggerSink,
{
    timer: T,
    origin: u64,
    triggers: G,
    responder: Box<dyn Responder>,
}

impl<T, G> ResponderRuntime<T, G>
where
    T: Timer<Timestamp = u64>,
    G: TriggerSink,
{
    pub fn new(timer: T, triggers: G, responder: Box<dyn Responder>) -> Self {
        let origin = timer.now();
        Self {
            timer,
            origin,
            triggers,
            responder,
        }
    }

    /// Seconds since the runtime was created.
    pub fn clock_s(&self) -> f64 {
        self.timer.elapsed(self.origin).as_secs_f64()
    }

    pub fn triggers(&self) -> &G {
        &self.triggers
    }

    fn send(&mut self, code: Option<u8>) {
        let at_s = self.clock_s();
        self.triggers.send(code, at_s);
    }
}

impl<T, G> Runtime for ResponderRuntime<T, G>
where
    T: Timer<Timestamp = u64>,
    G: TriggerSink,
{
    fn show(&mut self, request: &ShowRequest<'_>, observation: &Observation) -> ShowOutcome {
        let onset_s = self.clock_s();
        let started = self.timer.now();
        self.send(request.onset_trigger);
        if let Some(stim) = request.stimulus {
            trace!(label = request.label, stimulus = %stim.describe(), "show");
        }
        let action = self.responder.act(observation);
        if action.key.is_some() {
            debug!(label = request.label, "key during display-only phase ignored");
        }
        self.timer.sleep_until(started, secs(request.duration_s));
        ShowOutcome {
            onset_s,
            close_s: self.clock_s(),
        }
    }

    fn capture(&mut self, request: &CaptureRequest<'_>, observation: &Observation) -> CaptureOutcome {
        let onset_s = self.clock_s();
        let started = self.timer.now();
        self.send(request.onset_trigger);
        if let Some(stim) = request.stimulus {
            trace!(label = request.label, stimulus = %stim.describe(), "capture");
        }
        let action = self.responder.act(observation);
        let window = secs(request.duration_s);

        match validate_action(&action, request.keys, request.duration_s) {
            Ok(response) => {
                self.timer.sleep_until(started, secs(response.rt_s));
                self.send(request.response_trigger);
                if !request.terminate_on_response {
                    self.timer.sleep_until(started, window);
                }
                CaptureOutcome {
                    onset_s,
                    close_s: self.clock_s(),
                    response: Some(response),
                }
            }
            Err(reason) => {
                if action.key.is_some() {
                    debug!(label = request.label, key = ?action.key, reason, "response dropped");
                }
                self.timer.sleep_until(started, window);
                self.send(request.timeout_trigger);
                CaptureOutcome {
                    onset_s,
                    close_s: self.clock_s(),
                    response: None,
                }
            }
        }
    }

    fn wait_and_continue(
        &mut self,
        stimulus: Option<&StimulusType>,
        observation: &Observation,
    ) -> Option<String> {
        if let Some(stim) = stimulus {
            trace!(phase = %observation.phase, stimulus = %stim.describe(), "continue screen");
        }
        let started = self.timer.now();
        let action = self.responder.act(observation);
        let key = action.key.filter(|k| observation.accepts(k))?;
        self.timer
            .sleep_until(started, secs(action.rt_s.unwrap_or_default()));
        Some(key)
    }

    fn trigger(&mut self, code: Option<u8>) {
        self.send(code);
    }

    fn start_session(&mut self, session: &SessionInfo) {
        self.responder
            .start_session(session, Box::new(RngSource::seeded(session.seed)));
    }

    fn feedback(&mut self, feedback: &Feedback) {
        self.responder.on_feedback(feedback);
    }

    fn end_session(&mut self) {
        self.responder.end_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::RecordingTriggers;
    use gonogo_timing::SimulatedTimer;

    struct Fixed(Action);

    impl Responder for Fixed {
        fn start_session(&mut self, _: &SessionInfo, _: Box<dyn gonogo_core::RandomSource>) {}
        fn act(&mut self, _: &Observation) -> Action {
            self.0.clone()
        }
    }

    fn runtime(action: Action) -> ResponderRuntime<SimulatedTimer, RecordingTriggers> {
        ResponderRuntime::new(
            SimulatedTimer::new(),
            RecordingTriggers::new(),
            Box::new(Fixed(action)),
        )
    }

    fn keys() -> Vec<String> {
        vec!["space".to_string()]
    }

    fn capture_request(keys: &[String]) -> CaptureRequest<'_> {
        CaptureRequest {
            label: "go",
            stimulus: None,
            keys,
            duration_s: 1.0,
            onset_trigger: Some(10),
            response_trigger: Some(11),
            timeout_trigger: Some(12),
            terminate_on_response: true,
        }
    }

    #[test]
    fn oversized_durations_saturate() {
        assert_eq!(secs(1e20), Duration::MAX);
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(0.25), Duration::from_millis(250));
    }

    #[test]
    fn valid_press_ends_capture_early() {
        let mut rt = runtime(Action::press("space", 0.3));
        let keys = keys();
        let outcome = rt.capture(&capture_request(&keys), &Observation::new("go_response_window"));
        let response = outcome.response.unwrap();
        assert_eq!(response.key, "space");
        assert!((outcome.close_s - 0.3).abs() < 1e-6);
        assert_eq!(rt.triggers().codes(), vec![10, 11]);
    }

    #[test]
    fn capture_runs_full_window_without_early_termination() {
        let mut rt = runtime(Action::press("space", 0.3));
        let keys = keys();
        let mut request = capture_request(&keys);
        request.terminate_on_response = false;
        let outcome = rt.capture(&request, &Observation::new("go_response_window"));
        assert!(outcome.response.is_some());
        assert!((outcome.close_s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn foreign_key_times_out() {
        let mut rt = runtime(Action::press("q", 0.2));
        let keys = keys();
        let outcome = rt.capture(&capture_request(&keys), &Observation::new("go_response_window"));
        assert!(outcome.response.is_none());
        assert!((outcome.close_s - 1.0).abs() < 1e-6);
        assert_eq!(rt.triggers().codes(), vec![10, 12]);
    }

    #[test]
    fn late_or_malformed_latency_counts_as_no_response() {
        let keys = keys();
        assert!(validate_action(&Action::press("space", 1.5), &keys, 1.0).is_err());
        let mut nan = Action::press("space", 0.1);
        nan.rt_s = Some(f64::NAN);
        assert!(validate_action(&nan, &keys, 1.0).is_err());
        let mut missing = Action::press("space", 0.1);
        missing.rt_s = None;
        assert!(validate_action(&missing, &keys, 1.0).is_err());
        assert!(validate_action(&Action::press("space", 0.1), &[], 1.0).is_err());
        assert_eq!(
            validate_action(&Action::press("space", 1.0), &keys, 1.0),
            Ok(Response {
                key: "space".to_string(),
                rt_s: 1.0
            })
        );
    }

    #[test]
    fn show_holds_for_duration_and_ignores_keys() {
        let mut rt = runtime(Action::press("space", 0.1));
        let outcome = rt.show(
            &ShowRequest {
                label: "fixation",
                stimulus: None,
                duration_s: 0.5,
                onset_trigger: Some(1),
            },
            &Observation::new("pre_target_fixation"),
        );
        assert_eq!(outcome.onset_s, 0.0);
        assert!((outcome.close_s - 0.5).abs() < 1e-6);
        assert_eq!(rt.triggers().codes(), vec![1]);
    }

    #[test]
    fn continue_screen_returns_accepted_key_only() {
        let mut rt = runtime(Action::press("space", 0.25));
        let obs = Observation::new("block").with_keys(["space"]);
        assert_eq!(rt.wait_and_continue(None, &obs), Some("space".to_string()));
        assert!((rt.clock_s() - 0.25).abs() < 1e-6);

        let obs = Observation::new("block").with_keys(["return"]);
        assert_eq!(rt.wait_and_continue(None, &obs), None);
    }
}
