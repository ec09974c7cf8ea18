// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run configuration threaded through the calibrator and orchestrator.

use serde::{Deserialize, Serialize};

use crate::error::SiftError;

/// Environment variable consulted when no explicit worker count is given.
pub const WORKERS_ENV: &str = "PARAMSIFT_WORKERS";

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_INITIAL_BUFFER: usize = 8192;
pub const DEFAULT_MIN_BUFFER: usize = 256;
pub const DEFAULT_TRIAL_LENGTHS: [usize; 3] = [10, 15, 20];

/// Knobs for one discovery run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    /// Maximum number of batches searched concurrently.
    pub workers: usize,
    /// Starting request buffer size for payload budget estimation.
    pub initial_buffer: usize,
    /// Smallest buffer size tried before calibration gives up.
    pub min_buffer: usize,
    /// Lengths of the random parameter names used to vet metrics.
    pub trial_lengths: Vec<usize>,
    /// Seed for calibration name generation; entropy when unset.
    pub calibration_seed: Option<u64>,
    /// Search left and right halves of a bisection node concurrently.
    pub parallel_subtrees: bool,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            initial_buffer: DEFAULT_INITIAL_BUFFER,
            min_buffer: DEFAULT_MIN_BUFFER,
            trial_lengths: DEFAULT_TRIAL_LENGTHS.to_vec(),
            calibration_seed: None,
            parallel_subtrees: false,
        }
    }
}

impl SiftConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), SiftError> {
        if self.workers == 0 {
            return Err(SiftError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.min_buffer == 0 {
            return Err(SiftError::InvalidConfig("min_buffer must be positive".into()));
        }
        if self.min_buffer > self.initial_buffer {
            return Err(SiftError::InvalidConfig(format!(
                "min_buffer ({}) exceeds initial_buffer ({})",
                self.min_buffer, self.initial_buffer
            )));
        }
        if self.trial_lengths.is_empty() {
            return Err(SiftError::InvalidConfig(
                "at least one calibration trial length is required".into(),
            ));
        }
        if let Some(len) = self.trial_lengths.iter().find(|l| **l == 0 || **l > 52) {
            return Err(SiftError::InvalidConfig(format!(
                "trial length {len} is outside 1..=52"
            )));
        }
        Ok(())
    }
}

/// Resolve the worker count: explicit value, then `PARAMSIFT_WORKERS`, then
/// the default.
pub fn resolve_workers(explicit: Option<usize>) -> usize {
    if let Some(workers) = explicit {
        return workers;
    }

    if let Ok(env_workers) = std::env::var(WORKERS_ENV) {
        if let Ok(parsed) = env_workers.trim().parse::<usize>() {
            return parsed;
        }
    }

    DEFAULT_WORKERS
}
