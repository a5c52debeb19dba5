//! End-to-end session integration tests
//!
//! Drives a full monitored session with mock collaborators and checks the
//! sealed run record, the degrade paths, and the tracker hand-off failure.

use std::collections::BTreeMap;
use std::sync::Arc;

use vigil::VigilError;
use vigil::agent::{MockAnalysisStage, MockChatAgent};
use vigil::config::Config;
use vigil::domain::{AnalysisReport, RunRecord, UsageReport};
use vigil::population::InMemoryPopulation;
use vigil::recorder::{
    ArtifactSink, ExperimentTracker, FileSink, InMemorySink, InMemoryTracker, RunRecorder,
};
use vigil::session::{SessionOrchestrator, SessionState, TurnOutcome};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn analysis_report() -> AnalysisReport {
    AnalysisReport {
        content: "Findings consistent with a tension headache.".to_string(),
        retrieved_documents: vec!["guideline-12".to_string(), "case-note-7".to_string()],
        retrieval_scores: vec![0.8, 0.2],
        usage: UsageReport {
            input_cost: 0.001,
            output_cost: 0.002,
            total_cost: 0.003,
            prompt_tokens: 100,
            completion_tokens: 50,
            total_tokens: 150,
        },
    }
}

fn chat_agent() -> MockChatAgent {
    MockChatAgent::new(
        "Hello, what brings you in today?",
        vec!["How severe is the pain?".to_string()],
        "Chief complaint: headache, two days, moderate severity.",
    )
}

/// Full session: sample [30,32,31,45,46,44] vs baseline [30,31,29,32,30,31],
/// one turn, termination "bye", scores [0.8, 0.2] with threshold 0.3.
#[tokio::test]
async fn test_end_to_end_session_record() {
    init_logging();

    let tracker = Arc::new(InMemoryTracker::new());
    let sink = Arc::new(InMemorySink::new());

    let mut orch = SessionOrchestrator::new(
        Config::default(),
        vec![30.0, 31.0, 29.0, 32.0, 30.0, 31.0],
        chat_agent(),
        MockAnalysisStage::new(analysis_report()),
        InMemoryPopulation::new(vec![30.0, 32.0, 31.0, 45.0, 46.0, 44.0]),
        Arc::clone(&tracker),
        Arc::clone(&sink),
    )
    .unwrap();

    let opening = orch.begin().await.unwrap();
    assert_eq!(opening, "Hello, what brings you in today?");

    let reply = orch.handle_utterance("I have a headache").await.unwrap();
    assert_eq!(
        reply,
        TurnOutcome::Reply("How severe is the pain?".to_string())
    );

    let record = match orch.handle_utterance("bye").await.unwrap() {
        TurnOutcome::SessionComplete(record) => *record,
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(orch.state(), SessionState::Done);

    // Drift: present, not significant for this sample size
    assert_eq!(record.metrics["age_drift_detected"], 0.0);
    assert!(record.metrics.contains_key("age_drift_p_value"));
    assert!(record.metrics.contains_key("age_drift_statistic"));

    // Retrieval: summary and per-rank series
    assert_eq!(record.metrics["retrieval_score_avg"], 0.5);
    assert_eq!(record.metrics["retrieval_score_min"], 0.2);
    assert_eq!(record.metrics["retrieval_score_1"], 0.8);
    assert_eq!(record.metrics["retrieval_score_2"], 0.2);

    // Usage
    assert_eq!(record.metrics["prompt_tokens"], 100.0);
    assert_eq!(record.metrics["completion_tokens"], 50.0);

    // Transcript artifact covers every turn, in order
    let chat = &record.artifacts["chat_history"];
    let lines: Vec<&str> = chat.lines().collect();
    assert_eq!(lines[0], "assistant: Hello, what brings you in today?");
    assert_eq!(lines[1], "user: I have a headache");
    assert_eq!(lines[2], "assistant: How severe is the pain?");

    // Exactly one run opened and one sealed
    assert_eq!(tracker.started_runs().len(), 1);
    assert_eq!(tracker.sealed_runs().len(), 1);
    assert_eq!(tracker.sealed_runs()[0], record);

    // Out-of-band transcript save
    let saved = sink.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, "chat_history.txt");
    assert_eq!(saved[0].1, *chat);
}

/// Tracker that fails its end_run hand-off.
#[derive(Debug, Default)]
struct FailingTracker;

impl ExperimentTracker for FailingTracker {
    fn start_run(&self, _run_id: &str) -> vigil::Result<()> {
        Ok(())
    }

    fn end_run(&self, _record: &RunRecord) -> vigil::Result<()> {
        Err(VigilError::StoreUnavailable("tracker offline".to_string()))
    }
}

/// A failed tracker hand-off surfaces the sealed record instead of
/// dropping it, and the session still terminates.
#[tokio::test]
async fn test_tracker_failure_surfaces_record() {
    init_logging();

    let mut orch = SessionOrchestrator::new(
        Config::default(),
        vec![30.0, 31.0, 29.0],
        chat_agent(),
        MockAnalysisStage::new(analysis_report()),
        InMemoryPopulation::new(vec![30.0, 31.0]),
        Arc::new(FailingTracker),
        Arc::new(InMemorySink::new()),
    )
    .unwrap();

    orch.begin().await.unwrap();
    let err = orch.handle_utterance("bye").await.unwrap_err();

    match err {
        VigilError::TrackerWrite { reason, record } => {
            assert!(reason.contains("tracker offline"));
            assert!(record.metrics.contains_key("total_cost"));
            assert!(record.artifacts.contains_key("chat_history"));
        }
        other => panic!("expected TrackerWrite, got {:?}", other),
    }

    assert_eq!(orch.state(), SessionState::Done);
}

/// No documents retrieved: sentinels instead of failure, run still sealed.
#[tokio::test]
async fn test_session_with_no_retrieved_documents() {
    init_logging();

    let report = AnalysisReport {
        content: "No supporting documents found.".to_string(),
        retrieved_documents: vec![],
        retrieval_scores: vec![],
        usage: UsageReport::default(),
    };

    let tracker = Arc::new(InMemoryTracker::new());
    let mut orch = SessionOrchestrator::new(
        Config::default(),
        vec![30.0, 31.0, 29.0],
        chat_agent(),
        MockAnalysisStage::new(report),
        InMemoryPopulation::new(vec![30.0, 31.0]),
        Arc::clone(&tracker),
        Arc::new(InMemorySink::new()),
    )
    .unwrap();

    let record = orch.run_session(vec!["bye".to_string()]).await.unwrap();

    assert!(!record.metrics.contains_key("retrieval_score_avg"));
    assert!(!record.metrics.contains_key("retrieval_score_min"));
    assert!(!record.metrics.contains_key("retrieval_score_1"));
    assert_eq!(tracker.sealed_runs().len(), 1);
}

/// The recorder works standalone with a file-backed artifact sink.
#[tokio::test]
async fn test_recorder_with_file_sink() {
    init_logging();

    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(FileSink::new(dir.path()).unwrap());
    let tracker = Arc::new(InMemoryTracker::new());
    let mut recorder = RunRecorder::new(Arc::clone(&tracker), Arc::clone(&sink));

    recorder.start_run().unwrap();
    recorder.log_metric("total_tokens", 150.0).unwrap();
    recorder
        .save_artifact("assistant: hello\nuser: bye", "chat_history.txt")
        .unwrap();
    let record = recorder
        .end_run(BTreeMap::new(), BTreeMap::new(), BTreeMap::new())
        .unwrap();

    assert_eq!(record.metrics["total_tokens"], 150.0);
    let written = std::fs::read_to_string(dir.path().join("chat_history.txt")).unwrap();
    assert!(written.contains("user: bye"));
    assert_eq!(tracker.sealed_runs().len(), 1);
}

/// Direct sink use outside the recorder.
#[test]
fn test_in_memory_sink_direct() {
    let sink = InMemorySink::new();
    sink.save("content", "name.txt").unwrap();
    assert_eq!(sink.saved(), vec![("name.txt".to_string(), "content".to_string())]);
}
