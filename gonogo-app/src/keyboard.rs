use gonogo_core::{Action, Observation, RandomSource, Responder, SessionInfo, TrialPhase, CONTINUE_PHASES};
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Key name for a line typed on stdin. An empty line is the space bar.
fn key_from_line(line: &str) -> String {
    let key = line.trim();
    if key.is_empty() {
        "space".to_string()
    } else {
        key.to_lowercase()
    }
}

/// Human participant at the terminal.
///
/// A background thread forwards stdin lines, so a capture phase can wait
/// with a deadline and report the latency it measured itself.
pub struct KeyboardResponder {
    keys: Receiver<String>,
}

impl KeyboardResponder {
    pub fn from_receiver(keys: Receiver<String>) -> Self {
        Self { keys }
    }

    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(key_from_line(&line)).is_err() {
                    break;
                }
            }
        });
        Self::from_receiver(rx)
    }

    /// Lines typed while nothing was listening belong to no phase.
    fn drain(&self) {
        while self.keys.try_recv().is_ok() {}
    }

    fn prompt(observation: &Observation) {
        let stim = observation.stim_id.as_deref().unwrap_or("-");
        println!("[{}] {} ({})", observation.phase, stim, observation.valid_keys.join("/"));
        let _ = io::stdout().flush();
    }

    /// First key the observation accepts, or `None` once `limit_s` has
    /// passed since `started` or stdin is closed. Other keys are skipped.
    fn wait(&self, observation: &Observation, started: Instant, limit_s: Option<f64>) -> Option<String> {
        loop {
            let key = match limit_s {
                None => self.keys.recv().ok()?,
                Some(limit_s) => {
                    let left = limit_s - started.elapsed().as_secs_f64();
                    if !(left > 0.0) {
                        return None;
                    }
                    let timeout = Duration::try_from_secs_f64(left).unwrap_or(Duration::MAX);
                    self.keys.recv_timeout(timeout).ok()?
                }
            };
            if observation.accepts(&key) {
                return Some(key);
            }
            debug!(key = %key, phase = %observation.phase, "key not accepted, still waiting");
        }
    }
}

impl Responder for KeyboardResponder {
    fn start_session(&mut self, session: &SessionInfo, _rng: Box<dyn RandomSource>) {
        println!(
            "Subject {}: type a key name and press Enter (an empty line is space).",
            session.subject_id
        );
    }

    fn act(&mut self, observation: &Observation) -> Action {
        let phase = observation.normalized_phase();
        let is_continue = CONTINUE_PHASES.contains(&phase.as_str());
        let is_capture = TrialPhase::from_name(&phase).is_some_and(|p| p.allows_input());
        if observation.valid_keys.is_empty() || !(is_continue || is_capture) {
            if let Some(stim) = &observation.stim_id {
                println!("[{}] {}", observation.phase, stim);
            }
            return Action::withhold().with_meta("source", "keyboard");
        }

        self.drain();
        Self::prompt(observation);
        let started = Instant::now();
        let limit = if is_continue { None } else { observation.deadline() };
        match self.wait(observation, started, limit) {
            Some(key) => {
                let rt_s = started.elapsed().as_secs_f64();
                debug!(phase = %phase, key = %key, rt_s, "key pressed");
                Action::press(key, rt_s).with_meta("source", "keyboard")
            }
            None => Action::withhold().with_meta("source", "keyboard"),
        }
    }

    fn end_session(&mut self) {
        println!("Session finished.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(deadline_s: f64) -> Observation {
        Observation::new("go_response_window")
            .with_condition("go")
            .with_keys(["space"])
            .with_deadline(deadline_s)
    }

    #[test]
    fn stray_key_does_not_end_the_window() {
        let (tx, rx) = mpsc::channel();
        let mut responder = KeyboardResponder::from_receiver(rx);
        let typist = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send("x".to_string()).unwrap();
            thread::sleep(Duration::from_millis(50));
            tx.send("space".to_string()).unwrap();
            tx
        });
        let action = responder.act(&capture(0.5));
        let _tx = typist.join().unwrap();
        assert_eq!(action.key.as_deref(), Some("space"));
        let rt = action.rt_s.unwrap();
        assert!(rt >= 0.05 && rt < 0.5);
    }

    #[test]
    fn only_stray_keys_time_out() {
        let (tx, rx) = mpsc::channel();
        let mut responder = KeyboardResponder::from_receiver(rx);
        let typist = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send("q".to_string()).unwrap();
            tx
        });
        let started = Instant::now();
        let action = responder.act(&capture(0.1));
        let _tx = typist.join().unwrap();
        assert!(action.is_withheld());
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn continue_screen_waits_past_invalid_keys() {
        let (tx, rx) = mpsc::channel();
        let mut responder = KeyboardResponder::from_receiver(rx);
        let typist = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.send("a".to_string()).unwrap();
            tx.send("space".to_string()).unwrap();
            tx
        });
        let obs = Observation::new("block").with_keys(["space"]);
        let action = responder.act(&obs);
        let _tx = typist.join().unwrap();
        assert_eq!(action.key.as_deref(), Some("space"));
    }

    #[test]
    fn blank_line_is_space() {
        assert_eq!(key_from_line("\n"), "space");
        assert_eq!(key_from_line("  "), "space");
        assert_eq!(key_from_line(" J \n"), "j");
    }
}
