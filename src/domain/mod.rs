//! Domain types for Vigil
//!
//! This module contains the core record types:
//! - RunRecord: the unit of observability handed to the experiment tracker
//! - ParamValue: scalar run parameters (text, int, float)
//! - Transcript/Turn: the conversation history built into a run artifact
//! - AnalysisReport/UsageReport: output of the external analysis stage

pub mod analysis;
pub mod run_record;
pub mod transcript;

pub use analysis::{AnalysisReport, UsageReport};
pub use run_record::{ParamValue, RunRecord, RunState};
pub use transcript::{Role, Transcript, Turn};
