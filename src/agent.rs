//! External collaborator seams: the conversational agent and the
//! retrieval-augmented analysis stage.
//!
//! The real LLM/RAG backends live outside this crate; Vigil only depends
//! on these traits. Mock implementations are provided for tests and for
//! embedders that want to dry-run the pipeline.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::domain::{AnalysisReport, Transcript, Turn};
use crate::error::{Result, VigilError};

/// Stateful conversational agent driving one patient session.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// Emit the opening utterance and begin the session.
    async fn start_conversation(&mut self) -> Result<String>;

    /// Forward one user utterance, returning the agent's reply.
    async fn get_response(&mut self, input: &str) -> Result<String>;

    /// Summarize the session so far for the analysis stage.
    async fn generate_summary(&self) -> Result<String>;

    /// Full conversation history, in turn order.
    fn history(&self) -> Transcript;
}

/// One-shot analysis stage: takes the session summary, retrieves
/// supporting documents and produces a report with relevance scores.
#[async_trait]
pub trait AnalysisStage: Send + Sync {
    /// Analyze the given summary.
    async fn analyze(&self, summary: &str) -> Result<AnalysisReport>;
}

/// Scripted chat agent for tests and dry runs.
///
/// Replies are consumed in order; history is recorded like a real agent
/// would.
#[derive(Debug, Default)]
pub struct MockChatAgent {
    opening: String,
    replies: VecDeque<String>,
    summary: String,
    transcript: Transcript,
}

impl MockChatAgent {
    /// Create a mock with an opening line, scripted replies, and a fixed summary.
    pub fn new(
        opening: impl Into<String>,
        replies: Vec<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            opening: opening.into(),
            replies: replies.into(),
            summary: summary.into(),
            transcript: Transcript::new(),
        }
    }
}

#[async_trait]
impl ChatAgent for MockChatAgent {
    async fn start_conversation(&mut self) -> Result<String> {
        self.transcript.push(Turn::assistant(self.opening.clone()));
        Ok(self.opening.clone())
    }

    async fn get_response(&mut self, input: &str) -> Result<String> {
        let reply = self
            .replies
            .pop_front()
            .ok_or_else(|| VigilError::Agent("mock agent ran out of replies".to_string()))?;
        self.transcript.push(Turn::user(input));
        self.transcript.push(Turn::assistant(reply.clone()));
        Ok(reply)
    }

    async fn generate_summary(&self) -> Result<String> {
        Ok(self.summary.clone())
    }

    fn history(&self) -> Transcript {
        self.transcript.clone()
    }
}

/// Analysis stage that returns a canned report.
#[derive(Debug, Clone)]
pub struct MockAnalysisStage {
    report: AnalysisReport,
}

impl MockAnalysisStage {
    /// Create a mock returning the given report for every summary.
    pub fn new(report: AnalysisReport) -> Self {
        Self { report }
    }
}

#[async_trait]
impl AnalysisStage for MockAnalysisStage {
    async fn analyze(&self, _summary: &str) -> Result<AnalysisReport> {
        Ok(self.report.clone())
    }
}
