// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runs the bisection search for every batch on a bounded worker pool.
//!
//! Batches are independent: workers share only the read-only calibration
//! and the probe client. Batches are pulled lazily from the partitioner so
//! at most `workers` of them are materialised in flight at once. A probe
//! error abandons its own batch and leaves the others running.

use std::collections::BTreeSet;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::bisect::Bisector;
use crate::probe::ProbeClient;
use crate::progress::{ProgressEventKind, ProgressReporter};
use crate::types::ParamSlot;

/// A batch that contributed no result because one of its probes failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// Zero-based batch index in partition order.
    pub batch: usize,
    /// Number of names in the batch.
    pub params: usize,
    pub error: String,
}

/// Flattened result of searching all batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    /// Influential names, sorted and deduplicated.
    pub found: Vec<String>,
    /// Batches dispatched.
    pub batches: usize,
    pub failures: Vec<BatchFailure>,
    /// Worker tasks that died without reporting (panics, cancellation).
    pub aborted: usize,
}

/// Search every batch with at most `workers` in flight, blocking until all
/// of them have finished or failed.
pub async fn run_batches<C, I>(
    bisector: &Bisector<C>,
    batches: I,
    workers: usize,
    progress: &ProgressReporter,
) -> SearchOutcome
where
    C: ProbeClient + ?Sized + 'static,
    I: IntoIterator<Item = Vec<ParamSlot>>,
{
    let workers = workers.max(1);
    let mut batches = batches.into_iter().enumerate();
    let mut join_set = JoinSet::new();
    let mut found = BTreeSet::new();
    let mut outcome = SearchOutcome::default();

    loop {
        while join_set.len() < workers {
            let Some((index, batch)) = batches.next() else {
                break;
            };
            outcome.batches += 1;
            debug!(batch = index, params = batch.len(), "Dispatching batch");

            let bisector = bisector.clone();
            join_set.spawn(async move {
                let result = bisector.search(&batch).await;
                (index, batch.len(), result)
            });
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };

        match joined {
            Ok((index, params, Ok(names))) => {
                if !names.is_empty() {
                    info!(batch = index, found = ?names, "Influential parameters found");
                }
                progress.emit(ProgressEventKind::BatchCompleted {
                    batch: index,
                    params,
                    found: names.clone(),
                });
                found.extend(names);
            }
            Ok((index, params, Err(e))) => {
                warn!(batch = index, params, error = %e, "Batch abandoned after probe error");
                progress.emit(ProgressEventKind::BatchFailed {
                    batch: index,
                    params,
                    error: e.to_string(),
                });
                outcome.failures.push(BatchFailure {
                    batch: index,
                    params,
                    error: e.to_string(),
                });
            }
            Err(e) => {
                error!(error = %e, "Batch worker terminated abnormally");
                outcome.aborted += 1;
            }
        }
    }

    outcome.failures.sort_by_key(|f| f.batch);
    outcome.found = found.into_iter().collect();
    outcome
}
