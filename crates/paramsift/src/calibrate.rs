// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Startup calibration.
//!
//! Three steps, in order:
//! 1. capture the baseline response (no extra parameters);
//! 2. probe with harmless random parameter names and drop every metric
//!    that reports a difference, freezing the survivors into the oracle;
//! 3. size the largest parameter payload the target accepts by halving the
//!    request buffer until the target stops answering 413/414.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::SiftConfig;
use crate::error::{CalibrationFailure, SiftError};
use crate::oracle::{EquivalenceOracle, MetricPredicate};
use crate::probe::ProbeClient;
use crate::progress::{Phase, ProgressEventKind, ProgressReporter};
use crate::types::{ParamSlot, Placement, ProbeResponse, Target};

const ASCII_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Attempts at a non-colliding name before widening it by one letter.
const MAX_NAME_ATTEMPTS: usize = 64;

/// `?`, `=` and `&` around a query-string parameter.
const QUERY_OVERHEAD: usize = 3;

/// `=` and `&` around a body parameter.
const BODY_OVERHEAD: usize = 2;

/// Punctuation the final batches never send, added back to the capacity.
const CAPACITY_CORRECTION: usize = 2;

/// Frozen result of calibration, shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct Calibration {
    /// Reference response every probe is compared against.
    pub baseline: Arc<ProbeResponse>,
    pub oracle: EquivalenceOracle,
    /// Metrics dropped because they flagged harmless parameters.
    pub rejected: Vec<MetricPredicate>,
    /// Request buffer size the target accepted.
    pub buffer_size: usize,
    /// Encoded parameter bytes one probe may carry.
    pub capacity: usize,
}

/// Generate a random ASCII-letter name of `len` distinct letters that is not
/// in `exclude`.
///
/// Deterministic for a seeded `rng`.
pub fn random_param_name<R: Rng + ?Sized>(
    len: usize,
    exclude: &HashSet<String>,
    rng: &mut R,
) -> String {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let name: String = ASCII_LETTERS
            .choose_multiple(rng, len)
            .map(|&b| b as char)
            .collect();
        if !exclude.contains(&name) {
            return name;
        }
    }
    random_param_name(len + 1, exclude, rng)
}

/// Encoded parameter bytes left in a `buffer_size`-byte request once the
/// base URL (query placement) or fixed punctuation (body placement) is
/// accounted for. `None` when nothing is left.
///
/// The scheme and host are not counted: they never reach the server's
/// request-line buffer.
pub fn usable_capacity(target: &Target, buffer_size: usize) -> Option<usize> {
    let remaining = match target.placement() {
        Placement::Query => (buffer_size + target.origin_len())
            .checked_sub(target.url.as_str().len() + QUERY_OVERHEAD)?,
        Placement::Body => buffer_size.checked_sub(BODY_OVERHEAD)?,
    };
    (remaining > 0).then_some(remaining)
}

/// Split `metrics` into those that hold between `baseline` and `response`
/// and those that do not. Runs on the blocking pool.
async fn vet_metrics(
    metrics: Vec<MetricPredicate>,
    baseline: Arc<ProbeResponse>,
    response: ProbeResponse,
) -> (Vec<MetricPredicate>, Vec<MetricPredicate>) {
    let handle = tokio::task::spawn_blocking(move || {
        metrics
            .into_iter()
            .partition::<Vec<_>, _>(|m| m.holds(&baseline, &response))
    });
    match handle.await {
        Ok(split) => split,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => (Vec::new(), MetricPredicate::CATALOG.to_vec()),
    }
}

/// Runs the calibration steps against one target.
pub struct Calibrator<'a, C: ProbeClient + ?Sized> {
    client: &'a C,
    target: &'a Target,
    config: &'a SiftConfig,
    progress: &'a ProgressReporter,
}

impl<'a, C: ProbeClient + ?Sized> Calibrator<'a, C> {
    pub fn new(
        client: &'a C,
        target: &'a Target,
        config: &'a SiftConfig,
        progress: &'a ProgressReporter,
    ) -> Self {
        Self {
            client,
            target,
            config,
            progress,
        }
    }

    /// Run all three steps. `exclude` holds the known candidate names so the
    /// random trial names never collide with them.
    pub async fn run(&self, exclude: &HashSet<String>) -> Result<Calibration, SiftError> {
        self.config.validate()?;

        let baseline = Arc::new(self.capture_baseline().await?);
        let (oracle, rejected) = self.select_metrics(&baseline, exclude).await?;
        let (buffer_size, capacity) = self.estimate_capacity().await?;

        Ok(Calibration {
            baseline,
            oracle,
            rejected,
            buffer_size,
            capacity,
        })
    }

    /// Step 1: the reference response. Failure aborts the run.
    pub async fn capture_baseline(&self) -> Result<ProbeResponse, SiftError> {
        let started = Instant::now();
        self.progress.emit(ProgressEventKind::PhaseStarted {
            phase: Phase::Baseline,
            message: format!("{} {}", self.target.method, self.target.url),
        });

        let baseline = self
            .client
            .send(&[])
            .await
            .map_err(CalibrationFailure::Baseline)?;

        info!(
            status = baseline.status,
            bytes = baseline.body.len(),
            "Baseline captured"
        );
        self.progress.emit(ProgressEventKind::PhaseCompleted {
            phase: Phase::Baseline,
            message: format!("status {}, {} bytes", baseline.status, baseline.body.len()),
            duration_ms: started.elapsed().as_millis() as u64,
        });

        Ok(baseline)
    }

    /// Step 2: keep only the metrics that call every harmless trial response
    /// identical to the baseline.
    pub async fn select_metrics(
        &self,
        baseline: &Arc<ProbeResponse>,
        exclude: &HashSet<String>,
    ) -> Result<(EquivalenceOracle, Vec<MetricPredicate>), SiftError> {
        let started = Instant::now();
        self.progress.emit(ProgressEventKind::PhaseStarted {
            phase: Phase::MetricSelection,
            message: format!(
                "Vetting {} metrics with {} trial parameters",
                MetricPredicate::CATALOG.len(),
                self.config.trial_lengths.len()
            ),
        });

        let mut rng = match self.config.calibration_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut active: Vec<MetricPredicate> = MetricPredicate::CATALOG.to_vec();
        let mut rejected = Vec::new();

        for &len in &self.config.trial_lengths {
            let name = random_param_name(len, exclude, &mut rng);
            let slot = ParamSlot::new(name.clone(), self.target.default_value.clone());
            let response = self
                .client
                .send(std::slice::from_ref(&slot))
                .await
                .map_err(CalibrationFailure::Trial)?;

            debug!(param = %name, status = response.status, "Metric trial response");

            let (keep, drop) = vet_metrics(active, Arc::clone(baseline), response).await;
            for metric in &drop {
                warn!(%metric, param = %name, "Metric unstable for this target, discarding");
                self.progress.emit(ProgressEventKind::MetricRejected {
                    metric: *metric,
                    trial_param: name.clone(),
                });
            }
            rejected.extend(drop);
            active = keep;
        }

        let oracle = EquivalenceOracle::new(active)?;
        let chosen: Vec<String> = oracle.metrics().iter().map(|m| m.to_string()).collect();
        info!(metrics = ?chosen, "Comparison metrics chosen");
        self.progress.emit(ProgressEventKind::PhaseCompleted {
            phase: Phase::MetricSelection,
            message: format!("Chosen metrics: {}", chosen.join(", ")),
            duration_ms: started.elapsed().as_millis() as u64,
        });

        Ok((oracle, rejected))
    }

    /// Step 3: returns `(buffer_size, capacity)` for the first buffer size
    /// whose oversized dummy parameter is not answered with 413/414.
    ///
    /// A transport failure on the dummy probe counts as a rejection: servers
    /// commonly reset the connection instead of answering 414.
    pub async fn estimate_capacity(&self) -> Result<(usize, usize), SiftError> {
        let started = Instant::now();
        self.progress.emit(ProgressEventKind::PhaseStarted {
            phase: Phase::CapacityEstimation,
            message: format!("Starting from a {}-byte buffer", self.config.initial_buffer),
        });

        let mut buffer_size = self.config.initial_buffer;
        while buffer_size >= self.config.min_buffer {
            let remaining = usable_capacity(self.target, buffer_size)
                .ok_or(CalibrationFailure::InvalidCapacity { buffer_size })?;

            let dummy = ParamSlot::new("a".repeat(remaining), self.target.default_value.clone());
            let status = match self.client.send(std::slice::from_ref(&dummy)).await {
                Ok(response) if !response.is_too_large() => {
                    let capacity = remaining + CAPACITY_CORRECTION;
                    self.progress.emit(ProgressEventKind::CapacityProbe {
                        buffer_size,
                        status: Some(response.status),
                        accepted: true,
                    });
                    info!(buffer_size, capacity, "Probe payload budget adopted");
                    self.progress.emit(ProgressEventKind::PhaseCompleted {
                        phase: Phase::CapacityEstimation,
                        message: format!("{capacity} bytes per probe"),
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                    return Ok((buffer_size, capacity));
                }
                Ok(response) => Some(response.status),
                Err(e) => {
                    debug!(buffer_size, error = %e, "Oversized probe failed at transport level");
                    None
                }
            };

            self.progress.emit(ProgressEventKind::CapacityProbe {
                buffer_size,
                status,
                accepted: false,
            });
            debug!(buffer_size, ?status, "Payload rejected, halving buffer");
            buffer_size /= 2;
        }

        Err(CalibrationFailure::PayloadFloor {
            floor: self.config.min_buffer,
        }
        .into())
    }
}
