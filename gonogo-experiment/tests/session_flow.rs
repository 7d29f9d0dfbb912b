use gonogo_experiment::{
    BlockSummary, NullTriggers, RecordingTriggers, ResponderRuntime, Session, TaskConfig,
};
use gonogo_sim::GoNoGoSampler;
use gonogo_timing::SimulatedTimer;
use std::collections::HashSet;

fn small_config(seed: u64) -> TaskConfig {
    let mut config = TaskConfig::from_json_str(&format!(
        r#"{{
            "task": {{"total_blocks": 2, "trial_per_block": 12, "seed": {seed}}},
            "subject": {{"subject_id": "s07"}}
        }}"#
    ))
    .unwrap();
    config.responder.p_false_alarm_nogo = 0.3;
    config
}

fn run_session(config: &TaskConfig) -> (gonogo_experiment::SessionReport, Vec<u8>) {
    let mut runtime = ResponderRuntime::new(
        SimulatedTimer::new(),
        RecordingTriggers::new(),
        Box::new(GoNoGoSampler::new(config.responder.clone())),
    );
    let report = Session::new(config).run(&mut runtime);
    (report, runtime.triggers().codes())
}

#[test]
fn session_runs_every_block_and_trial() {
    let config = small_config(5);
    let (report, codes) = run_session(&config);

    assert_eq!(report.blocks.len(), 2);
    assert_eq!(report.rows.len(), 24);
    assert_eq!(report.info.subject_id, "s07");

    let go = report.rows.iter().filter(|r| r.condition() == "go").count();
    assert_eq!(go, 18);

    for row in &report.rows {
        assert!(row.contains("block_id"));
        assert!(row.contains("fixation_onset_time"));
        assert!(row.contains("outcome"));
        let id = row.get("trial_id").and_then(|v| v.as_u64()).unwrap();
        assert!(id >= report.first_trial_id);
    }

    let ids: HashSet<u64> = report
        .rows
        .iter()
        .filter_map(|r| r.get("trial_id").and_then(|v| v.as_u64()))
        .collect();
    assert_eq!(ids.len(), 24);

    assert_eq!(codes.first(), Some(&98));
    assert_eq!(codes.last(), Some(&99));
    assert_eq!(codes.iter().filter(|&&c| c == 100).count(), 2);
    assert_eq!(codes.iter().filter(|&&c| c == 101).count(), 2);
}

#[test]
fn block_summaries_match_rows() {
    let config = small_config(11);
    let (report, _) = run_session(&config);
    for summary in &report.blocks {
        let rows: Vec<_> = report
            .rows
            .iter()
            .filter(|r| r.text("block_id") == Some(summary.block_id.as_str()))
            .cloned()
            .collect();
        assert_eq!(&BlockSummary::from_rows(&summary.block_id, &rows), summary);
        let hits = rows
            .iter()
            .filter(|r| r.condition() == "go" && r.text("outcome") == Some("hit"))
            .count();
        assert_eq!(summary.go_hits, hits);
        assert_eq!(summary.go_accuracy, hits as f64 / summary.n_go as f64);
    }
}

#[test]
fn same_seed_replays_the_same_session() {
    let config = small_config(21);
    let (a, _) = run_session(&config);
    let (b, _) = run_session(&config);

    let strip = |report: &gonogo_experiment::SessionReport| {
        report
            .rows
            .iter()
            .map(|r| {
                (
                    r.condition().to_string(),
                    r.text("outcome").map(str::to_string),
                    r.number("go_rt").or(r.number("nogo_rt")),
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(&a), strip(&b));
    assert_eq!(a.blocks, b.blocks);
}

#[test]
fn rows_are_written_as_csv() {
    let config = small_config(3);
    let mut runtime = ResponderRuntime::new(
        SimulatedTimer::new(),
        NullTriggers,
        Box::new(GoNoGoSampler::new(config.responder.clone())),
    );
    let report = Session::new(&config).run(&mut runtime);

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let path = std::env::temp_dir()
        .join(format!("gonogo_rows_{nanos}"))
        .join("results.csv");
    report.write_rows(&path).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let header = reader.headers().unwrap().clone();
    let condition = header.iter().position(|h| h == "condition").unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), report.rows.len());
    assert_eq!(header.len(), report.columns().len());
    assert!(rows.iter().all(|r| r.len() == header.len()));
    assert!(rows.iter().all(|r| &r[condition] == "go" || &r[condition] == "nogo"));
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
