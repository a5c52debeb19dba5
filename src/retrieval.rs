//! Retrieval quality monitoring.
//!
//! Scores a set of relevance scores from the analysis stage against a
//! configured threshold. Low scores are flagged and logged but never fail
//! the run on their own.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};

/// Summary statistics over one set of retrieval scores.
///
/// `avg_score` and `min_score` are `None` when no documents were
/// retrieved; that is a valid outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSummary {
    /// Arithmetic mean over all scores
    pub avg_score: Option<f64>,
    /// Minimum over all scores
    pub min_score: Option<f64>,
    /// Indices (retrieval rank order) of scores strictly below the threshold
    pub below_threshold: Vec<usize>,
}

/// Monitors retrieval relevance scores against a quality threshold.
#[derive(Debug, Clone)]
pub struct RetrievalMonitor {
    score_threshold: f64,
}

impl RetrievalMonitor {
    /// Create a monitor with the given score threshold.
    pub fn new(score_threshold: f64) -> Result<Self> {
        if !score_threshold.is_finite() {
            return Err(VigilError::Config(format!(
                "score threshold must be finite, got {}",
                score_threshold
            )));
        }
        Ok(Self { score_threshold })
    }

    /// The configured score threshold.
    pub fn score_threshold(&self) -> f64 {
        self.score_threshold
    }

    /// Summarize `scores` for the query that produced them.
    ///
    /// Pure apart from logging: flagged indices are reported via
    /// `log::warn!` so operators can inspect weak retrievals, but the
    /// summary itself is informational only.
    pub fn monitor_scores(&self, scores: &[f64], query: &str) -> RetrievalSummary {
        if scores.is_empty() {
            warn!("no documents retrieved for query: {}", query);
            return RetrievalSummary::default();
        }

        let avg = scores.iter().sum::<f64>() / scores.len() as f64;
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);

        let below_threshold: Vec<usize> = scores
            .iter()
            .enumerate()
            .filter(|&(_, &score)| score < self.score_threshold)
            .map(|(i, _)| i)
            .collect();

        if !below_threshold.is_empty() {
            warn!(
                "{} of {} retrieval scores below threshold {} for query: {}",
                below_threshold.len(),
                scores.len(),
                self.score_threshold,
                query
            );
        }

        RetrievalSummary {
            avg_score: Some(avg),
            min_score: Some(min),
            below_threshold,
        }
    }
}
