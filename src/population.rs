//! Population sample source for drift monitoring.
//!
//! The real backend is a read-only query over patient records (ages derived
//! from dates of birth, newest record first). Vigil depends only on this
//! trait; a source failure is caught at the orchestrator boundary and
//! degrades to an empty sample.

use std::sync::Mutex;

use crate::error::{Result, VigilError};

/// Read-only source of the most recent population observations.
pub trait PopulationSource: Send + Sync {
    /// Up to `limit` most recent observations, newest first.
    fn recent_ages(&self, limit: usize) -> Result<Vec<f64>>;
}

/// In-memory source over a fixed set of observations, newest first.
#[derive(Debug, Default)]
pub struct InMemoryPopulation {
    ages: Vec<f64>,
}

impl InMemoryPopulation {
    /// Create a source over the given observations (newest first).
    pub fn new(ages: Vec<f64>) -> Self {
        Self { ages }
    }
}

impl PopulationSource for InMemoryPopulation {
    fn recent_ages(&self, limit: usize) -> Result<Vec<f64>> {
        Ok(self.ages.iter().take(limit).copied().collect())
    }
}

/// Source that always fails, for exercising the degrade path.
#[derive(Debug, Default)]
pub struct UnavailablePopulation {
    calls: Mutex<usize>,
}

impl UnavailablePopulation {
    /// Number of times the source was queried.
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PopulationSource for UnavailablePopulation {
    fn recent_ages(&self, _limit: usize) -> Result<Vec<f64>> {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        *calls += 1;
        Err(VigilError::StoreUnavailable(
            "patient record store unreachable".to_string(),
        ))
    }
}
