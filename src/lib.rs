//! Vigil - session monitoring and experiment recording for an LLM triage pipeline
//!
//! Vigil coordinates a multi-turn conversational session with a downstream
//! analysis stage and continuously monitors two quality signals: drift in the
//! population feeding the analysis, and the relevance of documents retrieved
//! to support it. Everything is aggregated into one sealed run record per
//! session for audit and cross-run comparison.

pub mod agent;
pub mod config;
pub mod domain;
pub mod drift;
pub mod error;
pub mod id;
pub mod population;
pub mod prompt;
pub mod recorder;
pub mod retrieval;
pub mod session;

pub use error::{Result, VigilError};
