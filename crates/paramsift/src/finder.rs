// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Discovery façade: calibrate once, then search any number of candidate
//! lists against the frozen calibration.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::bisect::Bisector;
use crate::calibrate::{Calibration, Calibrator};
use crate::config::SiftConfig;
use crate::error::SiftError;
use crate::harvest::Harvester;
use crate::oracle::MetricPredicate;
use crate::orchestrator::{run_batches, BatchFailure};
use crate::partition::{dedup_candidates, partition};
use crate::probe::ProbeClient;
use crate::progress::{Phase, ProgressEventKind, ProgressReporter};
use crate::types::Target;

/// Outcome of one search over a candidate list.
#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    /// Influential parameter names, sorted and deduplicated.
    pub found: Vec<String>,
    /// Distinct candidates searched.
    pub candidates: usize,
    pub batches: usize,
    /// Batches missing from `found` because a probe failed.
    pub failed_batches: Vec<BatchFailure>,
    pub aborted_batches: usize,
    /// Names too long to fit in any probe.
    pub oversized: Vec<String>,
    /// Search probes issued (calibration excluded).
    pub probes: u64,
    pub elapsed_ms: u64,
    pub metrics: Vec<MetricPredicate>,
    pub capacity: usize,
}

impl Discovery {
    /// True when every batch was searched to completion.
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty() && self.aborted_batches == 0
    }
}

/// A calibrated discovery session against one target.
pub struct ParamFinder<C: ProbeClient + ?Sized + 'static> {
    client: Arc<C>,
    target: Arc<Target>,
    config: SiftConfig,
    calibration: Arc<Calibration>,
    progress: Arc<ProgressReporter>,
}

impl<C: ProbeClient + ?Sized + 'static> ParamFinder<C> {
    /// Calibrate against the target. `known` candidates are kept out of the
    /// random trial names.
    ///
    /// Names harvested later from the baseline are not known yet and are not
    /// excluded; a trial name colliding with one is improbable but possible.
    pub async fn calibrate(
        client: Arc<C>,
        target: Arc<Target>,
        config: SiftConfig,
        progress: Arc<ProgressReporter>,
        known: &[String],
    ) -> Result<Self, SiftError> {
        let exclude: HashSet<String> = known.iter().cloned().collect();
        let calibration = Calibrator::new(client.as_ref(), &target, &config, &progress)
            .run(&exclude)
            .await?;

        Ok(Self {
            client,
            target,
            config,
            calibration: Arc::new(calibration),
            progress,
        })
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn config(&self) -> &SiftConfig {
        &self.config
    }

    /// Extra candidates harvested from the baseline response.
    pub async fn harvest(&self, harvester: &Harvester) -> Vec<String> {
        let started = Instant::now();
        self.progress.emit(ProgressEventKind::PhaseStarted {
            phase: Phase::Harvest,
            message: "Scanning baseline markup and scripts".to_string(),
        });

        let names = harvester
            .harvest(
                &self.calibration.baseline.text,
                self.target.url.as_str(),
                self.client.as_ref(),
            )
            .await;

        self.progress.emit(ProgressEventKind::PhaseCompleted {
            phase: Phase::Harvest,
            message: format!("{} names harvested", names.len()),
            duration_ms: started.elapsed().as_millis() as u64,
        });
        names
    }

    /// Search `candidates` for influential parameters. Blocks until every
    /// batch has been searched or has failed.
    pub async fn find(&self, candidates: Vec<String>) -> Discovery {
        let started = Instant::now();
        let names = dedup_candidates(candidates);
        let total = names.len();
        let capacity = self.calibration.capacity;

        info!(candidates = total, capacity, workers = self.config.workers, "Starting search");
        self.progress.emit(ProgressEventKind::SearchPlanned {
            candidates: total,
            capacity,
        });
        self.progress.emit(ProgressEventKind::PhaseStarted {
            phase: Phase::Search,
            message: format!("{total} candidates, {capacity} bytes per probe"),
        });

        let bisector = Bisector::new(Arc::clone(&self.client), Arc::clone(&self.calibration))
            .with_parallel_subtrees(self.config.parallel_subtrees);

        let mut batches = partition(names, &self.target.default_value, capacity);
        let outcome = run_batches(
            &bisector,
            batches.by_ref(),
            self.config.workers,
            &self.progress,
        )
        .await;

        let oversized = batches.into_oversized();
        if !oversized.is_empty() {
            warn!(count = oversized.len(), "Candidates skipped as too long for any probe");
            self.progress.emit(ProgressEventKind::OversizedSkipped {
                count: oversized.len(),
            });
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let discovery = Discovery {
            found: outcome.found,
            candidates: total,
            batches: outcome.batches,
            failed_batches: outcome.failures,
            aborted_batches: outcome.aborted,
            oversized,
            probes: bisector.probe_count(),
            elapsed_ms,
            metrics: self.calibration.oracle.metrics().to_vec(),
            capacity,
        };

        info!(
            found = discovery.found.len(),
            batches = discovery.batches,
            failed = discovery.failed_batches.len(),
            probes = discovery.probes,
            elapsed_ms,
            "Search complete"
        );
        self.progress.emit(ProgressEventKind::PhaseCompleted {
            phase: Phase::Search,
            message: format!("{} influential parameters", discovery.found.len()),
            duration_ms: elapsed_ms,
        });
        self.progress.emit(ProgressEventKind::DiscoveryComplete {
            found: discovery.found.len(),
            batches: discovery.batches,
            failed_batches: discovery.failed_batches.len(),
            probes: discovery.probes,
            elapsed_ms,
        });

        discovery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::types::{ParamSlot, ProbeResponse};
    use async_trait::async_trait;

    /// Body gains a `<b>` element while `debug` is present.
    struct DebugPage;

    #[async_trait]
    impl ProbeClient for DebugPage {
        async fn send(&self, params: &[ParamSlot]) -> Result<ProbeResponse, ProbeError> {
            if params.iter().any(|p| p.name == "debug") {
                Ok(ProbeResponse::ok("<html><b>1</b></html>"))
            } else {
                Ok(ProbeResponse::ok("<html></html>"))
            }
        }
    }

    async fn finder() -> ParamFinder<DebugPage> {
        let target = Arc::new(Target::new("http://synthetic.test/page").unwrap());
        let config = SiftConfig {
            calibration_seed: Some(11),
            ..SiftConfig::default()
        };
        ParamFinder::calibrate(
            Arc::new(DebugPage),
            target,
            config,
            Arc::new(ProgressReporter::disabled()),
            &[],
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_finds_debug_only() {
        let finder = finder().await;
        assert_eq!(finder.calibration().oracle.metrics().len(), 3);

        let discovery = finder
            .find(vec!["debug".into(), "format".into(), "id".into()])
            .await;
        assert_eq!(discovery.found, vec!["debug"]);
        assert_eq!(discovery.candidates, 3);
        assert!(discovery.is_complete());
    }

    #[tokio::test]
    async fn test_duplicates_collapse() {
        let finder = finder().await;
        let discovery = finder
            .find(vec!["debug".into(), "debug".into(), "x".into(), "x".into()])
            .await;
        assert_eq!(discovery.candidates, 2);
        assert_eq!(discovery.found, vec!["debug"]);
    }

    #[tokio::test]
    async fn test_oversized_candidates_are_reported() {
        let (tx, mut rx) = crate::progress::channel();
        let target = Arc::new(Target::new("http://synthetic.test/page").unwrap());
        let config = SiftConfig {
            calibration_seed: Some(11),
            ..SiftConfig::default()
        };
        let finder = ParamFinder::calibrate(
            Arc::new(DebugPage),
            target,
            config,
            Arc::new(ProgressReporter::new(Some(tx))),
            &[],
        )
        .await
        .unwrap();

        let long = "x".repeat(finder.calibration().capacity + 1);
        let discovery = finder.find(vec![long.clone(), "debug".into()]).await;
        assert_eq!(discovery.found, vec!["debug"]);
        assert_eq!(discovery.oversized, vec![long]);

        let mut settled = 0;
        let mut skipped = None;
        while let Ok(event) = rx.try_recv() {
            match event.event {
                ProgressEventKind::SearchPlanned { candidates, .. } => assert_eq!(candidates, 2),
                ProgressEventKind::BatchCompleted { params, .. } => settled += params,
                ProgressEventKind::OversizedSkipped { count } => skipped = Some(count),
                _ => {}
            }
        }
        assert_eq!(skipped, Some(1));
        assert_eq!(settled + 1, 2);
    }

    /// Records the name of every single-parameter request.
    struct Recording(std::sync::Mutex<Vec<String>>);

    #[async_trait]
    impl ProbeClient for Recording {
        async fn send(&self, params: &[ParamSlot]) -> Result<ProbeResponse, ProbeError> {
            if let [slot] = params {
                self.0.lock().unwrap().push(slot.name.clone());
            }
            Ok(ProbeResponse::ok("<html></html>"))
        }
    }

    #[tokio::test]
    async fn test_known_candidates_are_not_used_as_trial_names() {
        use crate::calibrate::random_param_name;
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let seed = 5;
        let first_trial = random_param_name(10, &HashSet::new(), &mut StdRng::seed_from_u64(seed));
        let config = SiftConfig {
            calibration_seed: Some(seed),
            ..SiftConfig::default()
        };

        let unconstrained = Arc::new(Recording(Default::default()));
        ParamFinder::calibrate(
            Arc::clone(&unconstrained),
            Arc::new(Target::new("http://synthetic.test/").unwrap()),
            config.clone(),
            Arc::new(ProgressReporter::disabled()),
            &[],
        )
        .await
        .unwrap();
        assert!(unconstrained.0.lock().unwrap().contains(&first_trial));

        let client = Arc::new(Recording(Default::default()));
        ParamFinder::calibrate(
            Arc::clone(&client),
            Arc::new(Target::new("http://synthetic.test/").unwrap()),
            config,
            Arc::new(ProgressReporter::disabled()),
            &[first_trial.clone()],
        )
        .await
        .unwrap();
        let sent = client.0.lock().unwrap();
        assert!(!sent.contains(&first_trial), "{sent:?}");
        // Trials plus at least one capacity request.
        assert!(sent.len() >= 4);
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let finder = finder().await;
        let discovery = finder.find(Vec::new()).await;
        assert!(discovery.found.is_empty());
        assert_eq!(discovery.batches, 0);
        assert_eq!(discovery.probes, 0);
    }
}
