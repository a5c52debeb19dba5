//! Run recording - owns the lifecycle of one experiment run.
//!
//! The recorder accumulates metrics, parameters and artifacts while a run
//! is open, then seals the record and hands it to the experiment tracker
//! exactly once. Lifecycle misuse surfaces as a hard error; a failed
//! hand-off returns the sealed record to the caller instead of dropping it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, info};

use crate::domain::{ParamValue, RunRecord, RunState};
use crate::error::{Result, VigilError};
use crate::id::generate_run_id;

/// Durable storage contract for sealed runs.
pub trait ExperimentTracker: Send + Sync {
    /// Register a newly opened run.
    fn start_run(&self, run_id: &str) -> Result<()>;

    /// Persist a sealed run. Called exactly once per completed run.
    fn end_run(&self, record: &RunRecord) -> Result<()>;
}

/// Out-of-band sink for large text artifacts (e.g. the full transcript)
/// that should not inflate the primary artifact mapping.
pub trait ArtifactSink: Send + Sync {
    /// Save `content` under `name`.
    fn save(&self, content: &str, name: &str) -> Result<()>;
}

/// Accumulates one run at a time and hands sealed records to the tracker.
pub struct RunRecorder<T: ExperimentTracker, S: ArtifactSink> {
    tracker: Arc<T>,
    sink: Arc<S>,
    state: RunState,
    record: Option<RunRecord>,
}

impl<T: ExperimentTracker, S: ArtifactSink> RunRecorder<T, S> {
    /// Create a recorder in the `Closed` state.
    pub fn new(tracker: Arc<T>, sink: Arc<S>) -> Self {
        Self {
            tracker,
            sink,
            state: RunState::Closed,
            record: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Open a new run. Fails if one is already open.
    pub fn start_run(&mut self) -> Result<()> {
        if self.state != RunState::Closed {
            return Err(VigilError::RunState(
                "start_run called while a run is already open".to_string(),
            ));
        }

        let run_id = generate_run_id();
        self.tracker.start_run(&run_id)?;

        let mut record = RunRecord::new(&run_id);
        record.started_at = Some(Utc::now());
        self.record = Some(record);
        self.state = RunState::Open;

        info!("run {} opened", run_id);
        Ok(())
    }

    /// Record a numeric metric. Later writes to the same name overwrite.
    pub fn log_metric(&mut self, name: impl Into<String>, value: f64) -> Result<()> {
        let record = self.open_record("log_metric")?;
        record.metrics.insert(name.into(), value);
        Ok(())
    }

    /// Record a batch of metrics.
    pub fn log_metrics(&mut self, metrics: BTreeMap<String, f64>) -> Result<()> {
        let record = self.open_record("log_metrics")?;
        record.metrics.extend(metrics);
        Ok(())
    }

    /// Record a scalar parameter.
    pub fn log_param(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Result<()> {
        let record = self.open_record("log_param")?;
        record.parameters.insert(name.into(), value.into());
        Ok(())
    }

    /// Record a named text artifact.
    pub fn log_artifact(&mut self, name: impl Into<String>, content: impl Into<String>) -> Result<()> {
        let record = self.open_record("log_artifact")?;
        record.artifacts.insert(name.into(), content.into());
        Ok(())
    }

    /// Save a large text artifact out-of-band through the sink.
    ///
    /// The content does not enter the run's primary artifact mapping.
    pub fn save_artifact(&self, content: &str, name: &str) -> Result<()> {
        debug!("saving out-of-band artifact {}", name);
        self.sink.save(content, name)
    }

    /// Seal the run and hand it to the tracker, returning the sealed record.
    ///
    /// The given mappings are merged over the accumulated state, incoming
    /// key wins. The recorder returns to `Closed` whether or not the
    /// hand-off succeeds; on failure the sealed record travels inside the
    /// `TrackerWrite` error so the caller can retry or persist it elsewhere.
    pub fn end_run(
        &mut self,
        metrics: BTreeMap<String, f64>,
        parameters: BTreeMap<String, ParamValue>,
        artifacts: BTreeMap<String, String>,
    ) -> Result<RunRecord> {
        if self.state != RunState::Open {
            return Err(VigilError::RunState(
                "end_run called while no run is open".to_string(),
            ));
        }

        // Unreachable given the state check, but keeps take() honest.
        let mut record = self.record.take().ok_or_else(|| {
            VigilError::RunState("open run has no record".to_string())
        })?;

        record.merge(metrics, parameters, artifacts);
        record.ended_at = Some(Utc::now());
        self.state = RunState::Sealed;

        let outcome = self.tracker.end_run(&record);
        self.state = RunState::Closed;

        match outcome {
            Ok(()) => {
                info!(
                    "run {} sealed: {} metrics, {} parameters, {} artifacts",
                    record.run_id,
                    record.metrics.len(),
                    record.parameters.len(),
                    record.artifacts.len()
                );
                Ok(record)
            }
            Err(e) => Err(VigilError::TrackerWrite {
                reason: e.to_string(),
                record: Box::new(record),
            }),
        }
    }

    fn open_record(&mut self, operation: &str) -> Result<&mut RunRecord> {
        if self.state != RunState::Open {
            return Err(VigilError::RunState(format!(
                "{} called while no run is open",
                operation
            )));
        }
        self.record
            .as_mut()
            .ok_or_else(|| VigilError::RunState("open run has no record".to_string()))
    }
}

/// In-memory tracker, used in tests and as the default backend.
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    started: Mutex<Vec<String>>,
    sealed: Mutex<Vec<RunRecord>>,
}

impl InMemoryTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run IDs registered via `start_run`, in order.
    pub fn started_runs(&self) -> Vec<String> {
        self.started.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Sealed records received via `end_run`, in order.
    pub fn sealed_runs(&self) -> Vec<RunRecord> {
        self.sealed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ExperimentTracker for InMemoryTracker {
    fn start_run(&self, run_id: &str) -> Result<()> {
        self.started
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(run_id.to_string());
        Ok(())
    }

    fn end_run(&self, record: &RunRecord) -> Result<()> {
        self.sealed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

/// In-memory artifact sink recording (name, content) pairs.
#[derive(Debug, Default)]
pub struct InMemorySink {
    saved: Mutex<Vec<(String, String)>>,
}

impl InMemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved (name, content) pairs, in order.
    pub fn saved(&self) -> Vec<(String, String)> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ArtifactSink for InMemorySink {
    fn save(&self, content: &str, name: &str) -> Result<()> {
        self.saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name.to_string(), content.to_string()));
        Ok(())
    }
}

/// Sink that writes artifacts as files under a directory.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Create a sink writing under `dir`, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl ArtifactSink for FileSink {
    fn save(&self, content: &str, name: &str) -> Result<()> {
        let path = self.dir.join(name);
        fs::write(&path, content)?;
        debug!("artifact written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tracker whose end_run always fails, for the hand-off failure path.
    #[derive(Debug, Default)]
    struct FailingTracker;

    impl ExperimentTracker for FailingTracker {
        fn start_run(&self, _run_id: &str) -> Result<()> {
            Ok(())
        }

        fn end_run(&self, _record: &RunRecord) -> Result<()> {
            Err(VigilError::StoreUnavailable("backend down".to_string()))
        }
    }

    fn recorder() -> RunRecorder<InMemoryTracker, InMemorySink> {
        RunRecorder::new(Arc::new(InMemoryTracker::new()), Arc::new(InMemorySink::new()))
    }

    #[test]
    fn test_initial_state_closed() {
        let recorder = recorder();
        assert_eq!(recorder.state(), RunState::Closed);
    }

    #[test]
    fn test_start_run_opens() {
        let mut recorder = recorder();
        recorder.start_run().unwrap();
        assert_eq!(recorder.state(), RunState::Open);
    }

    #[test]
    fn test_double_start_is_run_state_error() {
        let mut recorder = recorder();
        recorder.start_run().unwrap();
        let err = recorder.start_run().unwrap_err();
        assert!(matches!(err, VigilError::RunState(_)));
    }

    #[test]
    fn test_end_without_start_is_run_state_error() {
        let mut recorder = recorder();
        let err = recorder
            .end_run(BTreeMap::new(), BTreeMap::new(), BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, VigilError::RunState(_)));
    }

    #[test]
    fn test_log_while_closed_is_run_state_error() {
        let mut recorder = recorder();
        assert!(matches!(
            recorder.log_metric("x", 1.0).unwrap_err(),
            VigilError::RunState(_)
        ));
        assert!(matches!(
            recorder.log_param("p", 1.0).unwrap_err(),
            VigilError::RunState(_)
        ));
        assert!(matches!(
            recorder.log_artifact("a", "text").unwrap_err(),
            VigilError::RunState(_)
        ));
    }

    #[test]
    fn test_metric_merge_override_wins() {
        let tracker = Arc::new(InMemoryTracker::new());
        let mut recorder = RunRecorder::new(Arc::clone(&tracker), Arc::new(InMemorySink::new()));

        recorder.start_run().unwrap();
        recorder.log_metric("a", 0.0).unwrap();
        recorder.log_metric("b", 2.0).unwrap();

        let mut final_metrics = BTreeMap::new();
        final_metrics.insert("a".to_string(), 1.0);
        let record = recorder
            .end_run(final_metrics, BTreeMap::new(), BTreeMap::new())
            .unwrap();

        assert_eq!(record.metrics["a"], 1.0);
        assert_eq!(record.metrics["b"], 2.0);
        assert_eq!(recorder.state(), RunState::Closed);

        let sealed = tracker.sealed_runs();
        assert_eq!(sealed.len(), 1);
        assert_eq!(sealed[0], record);
    }

    #[test]
    fn test_end_run_stamps_timestamps() {
        let mut recorder = recorder();
        recorder.start_run().unwrap();
        let record = recorder
            .end_run(BTreeMap::new(), BTreeMap::new(), BTreeMap::new())
            .unwrap();
        assert!(record.started_at.is_some());
        assert!(record.ended_at.is_some());
        assert!(record.ended_at >= record.started_at);
    }

    #[test]
    fn test_recorder_reusable_after_end_run() {
        let tracker = Arc::new(InMemoryTracker::new());
        let mut recorder = RunRecorder::new(Arc::clone(&tracker), Arc::new(InMemorySink::new()));

        recorder.start_run().unwrap();
        let first = recorder
            .end_run(BTreeMap::new(), BTreeMap::new(), BTreeMap::new())
            .unwrap();

        recorder.start_run().unwrap();
        let second = recorder
            .end_run(BTreeMap::new(), BTreeMap::new(), BTreeMap::new())
            .unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(tracker.sealed_runs().len(), 2);
        assert_eq!(tracker.started_runs().len(), 2);
    }

    #[test]
    fn test_failed_handoff_returns_record() {
        let mut recorder =
            RunRecorder::new(Arc::new(FailingTracker), Arc::new(InMemorySink::new()));

        recorder.start_run().unwrap();
        recorder.log_metric("total_cost", 0.5).unwrap();

        let err = recorder
            .end_run(BTreeMap::new(), BTreeMap::new(), BTreeMap::new())
            .unwrap_err();

        match err {
            VigilError::TrackerWrite { reason, record } => {
                assert!(reason.contains("backend down"));
                assert_eq!(record.metrics["total_cost"], 0.5);
                assert!(record.ended_at.is_some());
            }
            other => panic!("expected TrackerWrite, got {:?}", other),
        }

        // Recorder is closed again and can start a fresh run
        assert_eq!(recorder.state(), RunState::Closed);
        recorder.start_run().unwrap();
    }

    #[test]
    fn test_save_artifact_out_of_band() {
        let sink = Arc::new(InMemorySink::new());
        let recorder = RunRecorder::new(Arc::new(InMemoryTracker::new()), Arc::clone(&sink));

        recorder
            .save_artifact("user: hi\nassistant: hello", "chat_history.txt")
            .unwrap();

        let saved = sink.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "chat_history.txt");
        assert!(saved[0].1.contains("assistant: hello"));
    }

    #[test]
    fn test_file_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path()).unwrap();

        sink.save("transcript text", "chat_history.txt").unwrap();

        let content = fs::read_to_string(dir.path().join("chat_history.txt")).unwrap();
        assert_eq!(content, "transcript text");
    }

    #[test]
    fn test_log_param_and_artifact_accumulate() {
        let mut recorder = recorder();
        recorder.start_run().unwrap();
        recorder.log_param("temperature", 0.7).unwrap();
        recorder.log_param("summarization_model", "gpt-4o-mini").unwrap();
        recorder.log_artifact("summary_prompt", "Summarize...").unwrap();

        let record = recorder
            .end_run(BTreeMap::new(), BTreeMap::new(), BTreeMap::new())
            .unwrap();
        assert_eq!(record.parameters.len(), 2);
        assert_eq!(record.artifacts["summary_prompt"], "Summarize...");
    }
}
