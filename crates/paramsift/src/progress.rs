// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for discovery telemetry.
//!
//! The calibrator and orchestrator emit `ProgressEvent`s, which flow through
//! a `tokio::sync::broadcast` channel to all subscribers (progress bar, JSON
//! log). When no subscriber exists, events are silently dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::oracle::MetricPredicate;

/// A progress event emitted during a discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// A phase has started.
    PhaseStarted { phase: Phase, message: String },
    /// A phase completed successfully.
    PhaseCompleted {
        phase: Phase,
        message: String,
        duration_ms: u64,
    },
    /// A metric reported a difference for a harmless random parameter.
    MetricRejected {
        metric: MetricPredicate,
        trial_param: String,
    },
    /// One payload-size probe during capacity estimation.
    CapacityProbe {
        buffer_size: usize,
        status: Option<u16>,
        accepted: bool,
    },
    /// Search is about to start over this many candidates.
    SearchPlanned { candidates: usize, capacity: usize },
    /// A batch finished its bisection.
    BatchCompleted {
        batch: usize,
        params: usize,
        found: Vec<String>,
    },
    /// A batch was abandoned after a probe error.
    BatchFailed {
        batch: usize,
        params: usize,
        error: String,
    },
    /// Candidates left out of every batch because each alone exceeds the
    /// probe capacity.
    OversizedSkipped { count: usize },
    /// All batches have been processed.
    DiscoveryComplete {
        found: usize,
        batches: usize,
        failed_batches: usize,
        probes: u64,
        elapsed_ms: u64,
    },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Phases of a discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Capturing the reference response.
    Baseline,
    /// Vetting metrics against random parameters.
    MetricSelection,
    /// Halving the request buffer until the target accepts it.
    CapacityEstimation,
    /// Pulling extra candidate names out of the baseline page.
    Harvest,
    /// Batched bisection over the candidates.
    Search,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Baseline => write!(f, "Baseline"),
            Self::MetricSelection => write!(f, "Metric Selection"),
            Self::CapacityEstimation => write!(f, "Capacity Estimation"),
            Self::Harvest => write!(f, "Harvest"),
            Self::Search => write!(f, "Search"),
        }
    }
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
///
/// Slow receivers lag and skip events rather than stalling the search.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(1024)
}

/// Shared emitter used from every worker of one run.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: Option<ProgressSender>,
    run_id: String,
    seq: AtomicU64,
}

impl ProgressReporter {
    pub fn new(tx: Option<ProgressSender>) -> Self {
        Self {
            tx,
            run_id: uuid::Uuid::new_v4().to_string(),
            seq: AtomicU64::new(0),
        }
    }

    /// A reporter that drops everything.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Emit an event, ignoring send errors (no receivers listening).
    pub fn emit(&self, event: ProgressEventKind) {
        if let Some(ref sender) = self.tx {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
            let _ = sender.send(ProgressEvent {
                run_id: self.run_id.clone(),
                seq,
                event,
            });
        }
    }
}
