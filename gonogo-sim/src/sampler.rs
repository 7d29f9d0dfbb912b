use gonogo_core::{
    Action, CONTINUE_PHASES, DECISION_PHASES, Feedback, Observation, RandomSource, Responder,
    SessionInfo,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SOURCE: &str = "go_nogo_sampler";
const MIN_CONTINUE_RT_S: f64 = 0.01;
const MIN_RT_SD_S: f64 = 1e-6;

/// Sampler parameters as written in the task config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub go_key: String,
    pub p_hit_go: f64,
    pub p_false_alarm_nogo: f64,
    pub p_miss_go: f64,
    pub rt_go_mean_s: f64,
    pub rt_sd_s: f64,
    pub rt_min_s: f64,
    pub continue_rt_s: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            go_key: "space".to_string(),
            p_hit_go: 0.92,
            p_false_alarm_nogo: 0.18,
            p_miss_go: 0.04,
            rt_go_mean_s: 0.31,
            rt_sd_s: 0.05,
            rt_min_s: 0.12,
            continue_rt_s: 0.25,
        }
    }
}

fn probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

/// Simulated Go/No-Go participant.
///
/// Presses the go key with a configurable hit rate, false-alarms on no-go
/// trials at a configurable rate, and draws reaction times from a clamped
/// normal distribution. Continue screens are acknowledged after a fixed
/// latency. Without a bound random source every decision is a withhold.
pub struct GoNoGoSampler {
    go_key: String,
    p_hit_go: f64,
    p_false_alarm_nogo: f64,
    p_miss_go: f64,
    rt_go_mean_s: f64,
    rt_sd_s: f64,
    rt_min_s: f64,
    continue_rt_s: f64,
    rng: Option<Box<dyn RandomSource>>,
}

impl GoNoGoSampler {
    pub fn new(config: SamplerConfig) -> Self {
        let defaults = SamplerConfig::default();
        Self {
            go_key: config.go_key,
            p_hit_go: probability(config.p_hit_go),
            p_false_alarm_nogo: probability(config.p_false_alarm_nogo),
            p_miss_go: probability(config.p_miss_go),
            rt_go_mean_s: finite_or(config.rt_go_mean_s, defaults.rt_go_mean_s),
            rt_sd_s: finite_or(config.rt_sd_s, defaults.rt_sd_s).max(MIN_RT_SD_S),
            rt_min_s: finite_or(config.rt_min_s, 0.0).max(0.0),
            continue_rt_s: finite_or(config.continue_rt_s, defaults.continue_rt_s),
            rng: None,
        }
    }

    pub fn rt_min_s(&self) -> f64 {
        self.rt_min_s
    }

    pub fn continue_rt_s(&self) -> f64 {
        self.continue_rt_s.max(MIN_CONTINUE_RT_S)
    }

    fn pick_key(valid_keys: &[String], preferred: Option<&str>) -> Option<String> {
        if let Some(preferred) = preferred {
            if valid_keys.iter().any(|k| k == preferred) {
                return Some(preferred.to_string());
            }
        }
        valid_keys.first().cloned()
    }

    fn sample_rt(&mut self) -> f64 {
        let mean = self.rt_go_mean_s;
        let sd = self.rt_sd_s;
        match self.rng.as_mut() {
            Some(rng) => self.rt_min_s.max(rng.normal(mean, sd)),
            None => self.rt_min_s.max(mean),
        }
    }

    fn draw(&mut self) -> f64 {
        self.rng.as_mut().map_or(1.0, |rng| rng.uniform())
    }

    fn tagged(condition: &str, outcome: &str) -> Action {
        Action::withhold()
            .with_meta("source", SOURCE)
            .with_meta("condition", condition)
            .with_meta("outcome", outcome)
    }

    /// Keyed action, or a withheld `late` one when the latency misses the
    /// deadline.
    fn timed_press(&mut self, obs: &Observation, condition: &str, key: String, outcome: &str) -> Action {
        let rt_s = self.sample_rt();
        if let Some(deadline) = obs.deadline() {
            if rt_s > deadline {
                debug!(rt_s, deadline, "sampled response is late, withholding");
                return Self::tagged(condition, "late");
            }
        }
        Action::press(key, rt_s)
            .with_meta("source", SOURCE)
            .with_meta("condition", condition)
            .with_meta("outcome", outcome)
    }

    fn act_continue(&self, obs: &Observation, phase: &str) -> Action {
        match Self::pick_key(&obs.valid_keys, Some(self.go_key.as_str())) {
            Some(key) => Action::press(key, self.continue_rt_s())
                .with_meta("source", SOURCE)
                .with_meta("phase", phase),
            None => Action::withhold()
                .with_meta("source", SOURCE)
                .with_meta("reason", "no_valid_key"),
        }
    }

    fn act_go(&mut self, obs: &Observation, condition: &str) -> Action {
        if obs.valid_keys.is_empty() {
            return Self::tagged(condition, "miss").with_meta("reason", "no_valid_key");
        }
        if self.draw() < self.p_miss_go {
            return Self::tagged(condition, "miss");
        }
        if self.draw() <= self.p_hit_go {
            let key = Self::pick_key(&obs.valid_keys, Some(self.go_key.as_str()));
            match key {
                Some(key) => self.timed_press(obs, condition, key, "go_hit"),
                None => Self::tagged(condition, "miss"),
            }
        } else {
            let alternatives: Vec<String> = obs
                .valid_keys
                .iter()
                .filter(|k| **k != self.go_key)
                .cloned()
                .collect();
            match Self::pick_key(&alternatives, None) {
                Some(key) => self.timed_press(obs, condition, key, "go_error"),
                None => Self::tagged(condition, "miss"),
            }
        }
    }

    fn act_nogo(&mut self, obs: &Observation, condition: &str) -> Action {
        if obs.valid_keys.is_empty() {
            return Self::tagged(condition, "correct_withhold").with_meta("reason", "no_valid_key");
        }
        if self.draw() < self.p_false_alarm_nogo {
            match Self::pick_key(&obs.valid_keys, Some(self.go_key.as_str())) {
                Some(key) => self.timed_press(obs, condition, key, "false_alarm"),
                None => Self::tagged(condition, "correct_withhold"),
            }
        } else {
            Self::tagged(condition, "correct_withhold")
        }
    }
}

impl Default for GoNoGoSampler {
    fn default() -> Self {
        Self::new(SamplerConfig::default())
    }
}

impl Responder for GoNoGoSampler {
    fn start_session(&mut self, session: &SessionInfo, rng: Box<dyn RandomSource>) {
        debug!(subject = %session.subject_id, seed = session.seed, "sampler bound to session");
        self.rng = Some(rng);
    }

    fn act(&mut self, obs: &Observation) -> Action {
        let phase = obs.normalized_phase();

        if CONTINUE_PHASES.contains(&phase.as_str()) {
            return self.act_continue(obs, &phase);
        }

        if !DECISION_PHASES.contains(&phase.as_str()) || self.rng.is_none() {
            return Action::withhold()
                .with_meta("source", SOURCE)
                .with_meta("phase", phase)
                .with_meta("reason", "withhold");
        }

        let condition = obs.normalized_condition();
        match condition.as_str() {
            "go" => self.act_go(obs, &condition),
            "nogo" => self.act_nogo(obs, &condition),
            _ => Self::tagged(&condition, "unknown"),
        }
    }

    fn on_feedback(&mut self, _feedback: &Feedback) {}

    fn end_session(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use gonogo_core::RngSource;

    fn bound(config: SamplerConfig, seed: u64) -> GoNoGoSampler {
        let mut sampler = GoNoGoSampler::new(config);
        sampler.start_session(&SessionInfo::default(), Box::new(RngSource::seeded(seed)));
        sampler
    }

    fn target(condition: &str) -> Observation {
        Observation::new("target")
            .with_condition(condition)
            .with_keys(["space"])
            .with_deadline(1.0)
    }

    #[test]
    fn config_values_are_clamped() {
        let sampler = GoNoGoSampler::new(SamplerConfig {
            p_hit_go: 1.7,
            p_miss_go: -0.5,
            p_false_alarm_nogo: f64::NAN,
            rt_sd_s: 0.0,
            rt_min_s: -1.0,
            continue_rt_s: 0.0,
            ..SamplerConfig::default()
        });
        assert_eq!(sampler.p_hit_go, 1.0);
        assert_eq!(sampler.p_miss_go, 0.0);
        assert_eq!(sampler.p_false_alarm_nogo, 0.0);
        assert_eq!(sampler.rt_sd_s, MIN_RT_SD_S);
        assert_eq!(sampler.rt_min_s(), 0.0);
        assert_eq!(sampler.continue_rt_s(), MIN_CONTINUE_RT_S);
    }

    #[test]
    fn without_session_decisions_withhold() {
        let mut sampler = GoNoGoSampler::default();
        let action = sampler.act(&target("go"));
        assert!(action.is_withheld());
        assert_eq!(action.reason(), Some("withhold"));
    }

    #[test]
    fn deterministic_rt_fallback_uses_mean_or_floor() {
        let mut sampler = GoNoGoSampler::new(SamplerConfig {
            rt_go_mean_s: 0.05,
            rt_min_s: 0.12,
            ..SamplerConfig::default()
        });
        assert_eq!(sampler.sample_rt(), 0.12);
    }

    #[test]
    fn go_error_without_alternative_key_is_a_miss() {
        let mut sampler = bound(
            SamplerConfig {
                p_hit_go: 0.0,
                p_miss_go: 0.0,
                ..SamplerConfig::default()
            },
            5,
        );
        let action = sampler.act(&target("go"));
        assert!(action.is_withheld());
        assert_eq!(action.outcome(), Some("miss"));
    }

    #[test]
    fn go_error_presses_another_key() {
        let mut sampler = bound(
            SamplerConfig {
                p_hit_go: 0.0,
                p_miss_go: 0.0,
                rt_go_mean_s: 0.3,
                ..SamplerConfig::default()
            },
            5,
        );
        let obs = target("go").with_keys(["space", "f"]);
        let action = sampler.act(&obs);
        assert_eq!(action.key.as_deref(), Some("f"));
        assert_eq!(action.outcome(), Some("go_error"));
    }

    #[test]
    fn unknown_condition_is_withheld() {
        let mut sampler = bound(SamplerConfig::default(), 1);
        let action = sampler.act(&target("catch"));
        assert!(action.is_withheld());
        assert_eq!(action.outcome(), Some("unknown"));
    }

    #[test]
    fn unrecognized_phase_is_withheld_without_drawing() {
        let mut a = bound(SamplerConfig::default(), 9);
        let mut b = bound(SamplerConfig::default(), 9);
        let fixation = Observation::new("pre_target_fixation")
            .with_condition("go")
            .with_keys(["space"]);
        assert_eq!(a.act(&fixation).reason(), Some("withhold"));
        assert_eq!(a.act(&target("go")), b.act(&target("go")));
    }
}
