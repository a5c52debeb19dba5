//! Output of the external retrieval-augmented analysis stage.

use serde::{Deserialize, Serialize};

/// Cost and token accounting for one analysis call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageReport {
    /// Build a usage report from token counts and per-token rates (USD).
    pub fn from_tokens(prompt_tokens: u64, completion_tokens: u64, input_rate: f64, output_rate: f64) -> Self {
        let input_cost = prompt_tokens as f64 * input_rate;
        let output_cost = completion_tokens as f64 * output_rate;
        Self {
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Full response of the analysis stage for one session summary.
///
/// `retrieval_scores` is parallel to `retrieved_documents`, ordered by
/// retrieval rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Generated analysis text
    pub content: String,
    /// Documents retrieved to support the analysis
    pub retrieved_documents: Vec<String>,
    /// Relevance score per retrieved document, in rank order
    pub retrieval_scores: Vec<f64>,
    /// Cost/token accounting
    pub usage: UsageReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_from_tokens() {
        let usage = UsageReport::from_tokens(100, 50, 0.001, 0.002);
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.completion_tokens, 50);
        assert_eq!(usage.total_tokens, 150);
        assert!((usage.input_cost - 0.1).abs() < 1e-12);
        assert!((usage.output_cost - 0.1).abs() < 1e-12);
        assert!((usage.total_cost - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_analysis_report_serialization_roundtrip() {
        let report = AnalysisReport {
            content: "Likely tension headache.".to_string(),
            retrieved_documents: vec!["doc-a".to_string(), "doc-b".to_string()],
            retrieval_scores: vec![0.8, 0.2],
            usage: UsageReport::from_tokens(100, 50, 0.001, 0.002),
        };

        let json = serde_json::to_string(&report).unwrap();
        let restored: AnalysisReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, restored);
    }

    #[test]
    fn test_scores_parallel_to_documents() {
        let report = AnalysisReport {
            retrieved_documents: vec!["a".to_string(), "b".to_string()],
            retrieval_scores: vec![0.9, 0.1],
            ..Default::default()
        };
        assert_eq!(report.retrieved_documents.len(), report.retrieval_scores.len());
    }
}
