//! Session orchestration - drives one monitored conversation from opening
//! utterance to sealed run record.
//!
//! Flow: open a run and check population drift, loop turns against the
//! chat agent until a termination token, then summarize, analyze, monitor
//! retrieval quality, and close the run exactly once.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::agent::{AnalysisStage, ChatAgent};
use crate::config::Config;
use crate::domain::{ParamValue, RunRecord};
use crate::drift::{DriftMonitor, DriftReport};
use crate::error::{Result, VigilError};
use crate::population::PopulationSource;
use crate::prompt;
use crate::recorder::{ArtifactSink, ExperimentTracker, RunRecorder};
use crate::retrieval::RetrievalMonitor;

/// Utterances that end the session (matched case-insensitively).
pub const TERMINATION_TOKENS: [&str; 3] = ["quit", "exit", "bye"];

/// Lifecycle state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet started
    Idle,
    /// Turn loop in progress
    InSession,
    /// Termination token received, closing out
    Finalizing,
    /// Terminal; no further turns accepted
    Done,
}

/// Result of handling one user utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The agent's reply; the session continues
    Reply(String),
    /// Termination token received; the run is sealed
    SessionComplete(Box<RunRecord>),
}

/// Drives one conversational session with monitoring and run recording.
///
/// The orchestrator exclusively owns the open run for the session's
/// duration; all external calls are awaited sequentially, there are no
/// parallel turns.
pub struct SessionOrchestrator<A, N, P, T, S>
where
    A: ChatAgent,
    N: AnalysisStage,
    P: PopulationSource,
    T: ExperimentTracker,
    S: ArtifactSink,
{
    agent: A,
    analysis: N,
    population: P,
    recorder: RunRecorder<T, S>,
    drift_monitor: DriftMonitor,
    retrieval_monitor: RetrievalMonitor,
    config: Config,
    state: SessionState,
    drift: Option<DriftReport>,
}

impl<A, N, P, T, S> SessionOrchestrator<A, N, P, T, S>
where
    A: ChatAgent,
    N: AnalysisStage,
    P: PopulationSource,
    T: ExperimentTracker,
    S: ArtifactSink,
{
    /// Wire up an orchestrator from its collaborators.
    ///
    /// `baseline` is the reference distribution for the drift check.
    pub fn new(
        config: Config,
        baseline: Vec<f64>,
        agent: A,
        analysis: N,
        population: P,
        tracker: Arc<T>,
        sink: Arc<S>,
    ) -> Result<Self> {
        let drift_monitor =
            DriftMonitor::new(baseline, config.monitoring.drift_significance_level)?;
        let retrieval_monitor =
            RetrievalMonitor::new(config.monitoring.retrieval_score_threshold)?;

        Ok(Self {
            agent,
            analysis,
            population,
            recorder: RunRecorder::new(tracker, sink),
            drift_monitor,
            retrieval_monitor,
            config,
            state: SessionState::Idle,
            drift: None,
        })
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drift report from session start, if the check ran.
    pub fn drift_report(&self) -> Option<&DriftReport> {
        self.drift.as_ref()
    }

    /// Start the session: sample the population, check drift, open the
    /// run, and return the agent's opening utterance.
    ///
    /// A missing or empty population sample skips the drift check with a
    /// warning; the session proceeds and drift metrics are simply omitted
    /// from the final record.
    pub async fn begin(&mut self) -> Result<String> {
        if self.state != SessionState::Idle {
            return Err(VigilError::RunState(
                "begin called on a session that already started".to_string(),
            ));
        }

        let limit = self.config.monitoring.population_sample_limit;
        let ages = match self.population.recent_ages(limit) {
            Ok(ages) => ages,
            Err(e) => {
                warn!("population sample unavailable, drift check degraded: {}", e);
                Vec::new()
            }
        };

        self.drift = if ages.is_empty() {
            warn!("population sample empty, drift check skipped");
            None
        } else {
            match self.drift_monitor.check_drift(&ages) {
                Ok(report) => {
                    info!(
                        "drift check: statistic={} p_value={} is_drift={}",
                        report.statistic, report.p_value, report.is_drift
                    );
                    Some(report)
                }
                Err(e) => {
                    warn!("drift check skipped: {}", e);
                    None
                }
            }
        };

        self.recorder.start_run()?;

        let opening = self.agent.start_conversation().await?;
        self.state = SessionState::InSession;
        Ok(opening)
    }

    /// Handle one inbound user utterance.
    ///
    /// A termination token finalizes the session and returns the sealed
    /// record; anything else is forwarded to the agent.
    pub async fn handle_utterance(&mut self, input: &str) -> Result<TurnOutcome> {
        if self.state != SessionState::InSession {
            return Err(VigilError::RunState(format!(
                "utterance received in state {:?}",
                self.state
            )));
        }

        if is_termination(input) {
            self.state = SessionState::Finalizing;
            let outcome = self.finalize().await;
            // Terminal either way: the run was closed exactly once, or its
            // record travels inside the TrackerWrite error.
            self.state = SessionState::Done;
            return outcome.map(|record| TurnOutcome::SessionComplete(Box::new(record)));
        }

        let reply = self.agent.get_response(input).await?;
        Ok(TurnOutcome::Reply(reply))
    }

    /// Convenience driver: begin, feed the utterances in order, and
    /// return the sealed record.
    pub async fn run_session<I>(&mut self, turns: I) -> Result<RunRecord>
    where
        I: IntoIterator<Item = String>,
    {
        let opening = self.begin().await?;
        debug!("assistant: {}", opening);

        for turn in turns {
            match self.handle_utterance(&turn).await? {
                TurnOutcome::Reply(reply) => debug!("assistant: {}", reply),
                TurnOutcome::SessionComplete(record) => return Ok(*record),
            }
        }

        Err(VigilError::RunState(
            "utterance stream ended before a termination token".to_string(),
        ))
    }

    /// Close out the session: summarize, analyze, monitor retrieval,
    /// assemble the record, and end the run.
    async fn finalize(&mut self) -> Result<RunRecord> {
        // Order matters: scores come out of the analysis response before
        // the retrieval monitor sees them.
        let summary = self.agent.generate_summary().await?;
        let report = self.analysis.analyze(&summary).await?;
        let retrieval = self
            .retrieval_monitor
            .monitor_scores(&report.retrieval_scores, &summary);

        let mut metrics = BTreeMap::new();
        metrics.insert(
            "num_retrieved_samples".to_string(),
            f64::from(self.config.generation.n_results),
        );
        metrics.insert("input_cost".to_string(), report.usage.input_cost);
        metrics.insert("output_cost".to_string(), report.usage.output_cost);
        metrics.insert("total_cost".to_string(), report.usage.total_cost);
        metrics.insert(
            "prompt_tokens".to_string(),
            report.usage.prompt_tokens as f64,
        );
        metrics.insert(
            "completion_tokens".to_string(),
            report.usage.completion_tokens as f64,
        );
        metrics.insert("total_tokens".to_string(), report.usage.total_tokens as f64);

        if let Some(drift) = &self.drift {
            metrics.insert(
                "age_drift_detected".to_string(),
                if drift.is_drift { 1.0 } else { 0.0 },
            );
            metrics.insert("age_drift_p_value".to_string(), drift.p_value);
            metrics.insert("age_drift_statistic".to_string(), drift.statistic);
        }

        if let (Some(avg), Some(min)) = (retrieval.avg_score, retrieval.min_score) {
            metrics.insert("retrieval_score_avg".to_string(), avg);
            metrics.insert("retrieval_score_min".to_string(), min);
        }
        // Indexed series: disjoint names, one metric per retrieval rank
        for (i, score) in report.retrieval_scores.iter().enumerate() {
            metrics.insert(format!("retrieval_score_{}", i + 1), *score);
        }

        let generation = &self.config.generation;
        let mut parameters = BTreeMap::new();
        parameters.insert(
            "summarization_model".to_string(),
            ParamValue::from(generation.summarization_model.clone()),
        );
        parameters.insert(
            "embedding_model".to_string(),
            ParamValue::from(generation.embedding_model.clone()),
        );
        parameters.insert("n_results".to_string(), ParamValue::from(generation.n_results));
        parameters.insert(
            "temperature".to_string(),
            ParamValue::from(generation.temperature),
        );
        parameters.insert(
            "max_tokens".to_string(),
            ParamValue::from(generation.max_tokens),
        );

        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            "summary_prompt".to_string(),
            prompt::SUMMARY_PROMPT.to_string(),
        );
        artifacts.insert(
            "doctor_report_prompt".to_string(),
            prompt::DOCTOR_REPORT_PROMPT.to_string(),
        );
        artifacts.insert(
            "pipeline_output".to_string(),
            format!(
                "SYMPTOM SUMMARY:\n{}\n\nMEDICAL ANALYSIS:\n{}",
                summary, report.content
            ),
        );
        artifacts.insert(
            "prompt_templates".to_string(),
            serde_json::to_string_pretty(&prompt::chat_templates())?,
        );

        // Full transcript: out-of-band file plus a record artifact
        let chat_history = self.agent.history().render();
        self.recorder.save_artifact(&chat_history, "chat_history.txt")?;
        artifacts.insert("chat_history".to_string(), chat_history);

        self.recorder.end_run(metrics, parameters, artifacts)
    }
}

/// Whether `input` is a termination token (case-insensitive).
fn is_termination(input: &str) -> bool {
    let trimmed = input.trim();
    TERMINATION_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
}
