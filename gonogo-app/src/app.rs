use anyhow::{bail, Context, Result};
use gonogo_core::Responder;
use gonogo_experiment::{RecordingTriggers, ResponderRuntime, Session, SessionReport, TaskConfig};
use gonogo_sim::GoNoGoSampler;
use gonogo_timing::{HighPrecisionTimer, SimulatedTimer, Timer};
use std::path::PathBuf;
use tracing::info;

use crate::keyboard::KeyboardResponder;

/// Command line switches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    pub config: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub seed: Option<u64>,
    pub subject: Option<String>,
    pub interactive: bool,
    pub realtime: bool,
    pub help: bool,
}

pub fn usage() -> &'static str {
    "gonogo-app [--config PATH] [--out PATH] [--seed N] [--subject ID] [--interactive] [--realtime]\n\
     \n\
     --config PATH    task config (JSON); built-in defaults when omitted\n\
     --out PATH       results file, overrides task.res_file\n\
     --seed N         session seed, overrides task.seed\n\
     --subject ID     subject id, overrides subject.subject_id\n\
     --interactive    answer from the keyboard instead of the simulated responder\n\
     --realtime       hold every phase for its wall-clock duration\n"
}

impl Options {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Options::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => options.config = Some(PathBuf::from(value(&mut args, &arg)?)),
                "--out" => options.out = Some(PathBuf::from(value(&mut args, &arg)?)),
                "--seed" => {
                    let raw = value(&mut args, &arg)?;
                    options.seed = Some(raw.parse().with_context(|| format!("invalid --seed {raw}"))?);
                }
                "--subject" => options.subject = Some(value(&mut args, &arg)?),
                "--interactive" => options.interactive = true,
                "--realtime" => options.realtime = true,
                "-h" | "--help" => options.help = true,
                other => bail!("unknown argument {other}\n\n{}", usage()),
            }
        }
        Ok(options)
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next().with_context(|| format!("{flag} needs a value"))
}

pub struct App {
    options: Options,
    config: TaskConfig,
}

impl App {
    pub fn new(options: Options) -> Result<Self> {
        let mut config = match &options.config {
            Some(path) => TaskConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => TaskConfig::default(),
        };
        if let Some(seed) = options.seed {
            config.task.seed = seed;
        }
        if let Some(subject) = &options.subject {
            config.subject.subject_id = subject.clone();
        }
        Ok(Self { options, config })
    }

    fn responder(&self) -> Box<dyn Responder> {
        if self.options.interactive {
            Box::new(KeyboardResponder::spawn())
        } else {
            Box::new(GoNoGoSampler::new(self.config.responder.clone()))
        }
    }

    fn run_with<T: Timer<Timestamp = u64>>(&self, timer: T) -> (SessionReport, usize) {
        let mut runtime = ResponderRuntime::new(timer, RecordingTriggers::new(), self.responder());
        let report = Session::new(&self.config).run(&mut runtime);
        let sent = runtime.triggers().sent.len();
        (report, sent)
    }

    pub fn run(self) -> Result<()> {
        println!("=== GO/NO-GO TASK ===");
        println!("Platform: {}", std::env::consts::OS);
        println!("Architecture: {}", std::env::consts::ARCH);
        println!(
            "Subject: {}  Session: {}  Seed: {}",
            self.config.subject.subject_id, self.config.subject.session_id, self.config.task.seed
        );

        // Keyboard input is measured against the wall clock.
        let realtime = self.options.realtime || self.options.interactive;
        let (report, triggers_sent) = if realtime {
            info!("running in real time");
            self.run_with(HighPrecisionTimer::new())
        } else {
            info!("running on a simulated clock");
            self.run_with(SimulatedTimer::new())
        };

        println!();
        for summary in &report.blocks {
            println!(
                "{}: go {}/{} ({:.2})  nogo {}/{} ({:.2})",
                summary.block_id,
                summary.go_hits,
                summary.n_go,
                summary.go_accuracy,
                summary.nogo_correct,
                summary.n_nogo,
                summary.nogo_accuracy,
            );
        }
        println!("Trials: {}  Triggers sent: {}", report.rows.len(), triggers_sent);

        let out = self
            .options
            .out
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.config.task.res_file));
        report.write_rows(&out)?;
        println!("Results: {}", out.display());
        Ok(())
    }
}
