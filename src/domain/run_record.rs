//! Run record - the sealed unit of observability for one pipeline run.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of the run recorder.
///
/// `Sealed` is momentary: `end_run` seals the record, hands it to the
/// tracker, then returns the recorder to `Closed` for the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No run in progress
    Closed,
    /// A run is accumulating metrics/parameters/artifacts
    Open,
    /// Record assembled and immutable, hand-off in progress
    Sealed,
}

/// A scalar run parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Text parameter (model names, etc.)
    Text(String),
    /// Integer parameter (result counts, token limits)
    Int(i64),
    /// Float parameter (temperature, thresholds)
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "{}", s),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

/// The accumulated state of one experiment run.
///
/// Metric keys are unique; later writes to the same name overwrite.
/// BTreeMap keeps the mappings deterministically ordered for stable
/// serialization and comparison across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run identifier
    pub run_id: String,
    /// Named numeric metrics
    pub metrics: BTreeMap<String, f64>,
    /// Named scalar parameters, fixed before the run is sealed
    pub parameters: BTreeMap<String, ParamValue>,
    /// Named text artifacts
    pub artifacts: BTreeMap<String, String>,
    /// When the run was opened
    pub started_at: Option<DateTime<Utc>>,
    /// When the run was sealed
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Create an empty record for the given run ID.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            metrics: BTreeMap::new(),
            parameters: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Merge incremental mappings into this record, incoming key wins.
    ///
    /// A duplicate metric name is a caller bug; the override is applied
    /// without any implicit renaming.
    pub fn merge(
        &mut self,
        metrics: BTreeMap<String, f64>,
        parameters: BTreeMap<String, ParamValue>,
        artifacts: BTreeMap<String, String>,
    ) {
        self.metrics.extend(metrics);
        self.parameters.extend(parameters);
        self.artifacts.extend(artifacts);
    }
}
