// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bisection search over one batch.
//!
//! Probe the whole node; if the response matches the baseline nothing in it
//! matters and the branch is pruned. Otherwise split the node in half and
//! recurse until single names remain. Each influential name costs
//! O(log n) probes.
//!
//! Parameters that only matter in combination with others are not modelled:
//! splitting may separate them, which yields false negatives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::calibrate::Calibration;
use crate::error::ProbeError;
use crate::probe::ProbeClient;
use crate::types::ParamSlot;

/// Bisection engine over a frozen calibration. Cheap to clone; every
/// worker gets its own handle onto the same shared state.
pub struct Bisector<C: ProbeClient + ?Sized> {
    client: Arc<C>,
    calibration: Arc<Calibration>,
    parallel_subtrees: bool,
    probes: Arc<AtomicU64>,
}

impl<C: ProbeClient + ?Sized> Clone for Bisector<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            calibration: Arc::clone(&self.calibration),
            parallel_subtrees: self.parallel_subtrees,
            probes: Arc::clone(&self.probes),
        }
    }
}

impl<C: ProbeClient + ?Sized> Bisector<C> {
    pub fn new(client: Arc<C>, calibration: Arc<Calibration>) -> Self {
        Self {
            client,
            calibration,
            parallel_subtrees: false,
            probes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Evaluate left and right halves concurrently instead of in sequence.
    pub fn with_parallel_subtrees(mut self, enabled: bool) -> Self {
        self.parallel_subtrees = enabled;
        self
    }

    /// Total probes issued through this bisector and its clones.
    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    /// Names in `batch` whose presence changes the response.
    ///
    /// An empty batch is trivially clean and costs no probe.
    pub fn search<'a>(
        &'a self,
        batch: &'a [ParamSlot],
    ) -> BoxFuture<'a, Result<Vec<String>, ProbeError>> {
        async move {
            if batch.is_empty() {
                return Ok(Vec::new());
            }

            self.probes.fetch_add(1, Ordering::Relaxed);
            let response = self.client.send(batch).await?;
            let status = response.status;

            let calibration = &self.calibration;
            let same = calibration
                .oracle
                .judge(Arc::clone(&calibration.baseline), Arc::new(response))
                .await;
            if same {
                debug!(params = batch.len(), "Node matches baseline, pruned");
                return Ok(Vec::new());
            }

            if batch.len() == 1 {
                debug!(param = %batch[0].name, status, "Influential parameter");
                return Ok(vec![batch[0].name.clone()]);
            }

            let (left, right) = batch.split_at(batch.len() / 2);
            debug!(
                params = batch.len(),
                left = left.len(),
                right = right.len(),
                "Node differs from baseline, splitting"
            );

            let (mut found, right_found) = if self.parallel_subtrees {
                futures::try_join!(self.search(left), self.search(right))?
            } else {
                let l = self.search(left).await?;
                let r = self.search(right).await?;
                (l, r)
            };
            found.extend(right_found);
            Ok(found)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{EquivalenceOracle, MetricPredicate};
    use crate::types::ProbeResponse;
    use async_trait::async_trait;

    /// Responds with a different body whenever any marked name is present.
    struct MarkedClient {
        influential: Vec<String>,
    }

    #[async_trait]
    impl ProbeClient for MarkedClient {
        async fn send(&self, params: &[ParamSlot]) -> Result<ProbeResponse, ProbeError> {
            let hit = params.iter().any(|p| self.influential.contains(&p.name));
            Ok(ProbeResponse::ok(if hit { "<p>changed</p>" } else { "<p>base</p>" }))
        }
    }

    fn bisector(influential: &[&str]) -> Bisector<MarkedClient> {
        let calibration = Calibration {
            baseline: Arc::new(ProbeResponse::ok("<p>base</p>")),
            oracle: EquivalenceOracle::new(vec![MetricPredicate::TextSimilarity]).unwrap(),
            rejected: Vec::new(),
            buffer_size: 8192,
            capacity: 8000,
        };
        let client = MarkedClient {
            influential: influential.iter().map(|s| s.to_string()).collect(),
        };
        Bisector::new(Arc::new(client), Arc::new(calibration))
    }

    fn batch(n: usize) -> Vec<ParamSlot> {
        (0..n).map(|i| ParamSlot::new(format!("p{i}"), "1")).collect()
    }

    #[tokio::test]
    async fn test_clean_batch_costs_one_probe() {
        let b = bisector(&[]);
        let found = b.search(&batch(50)).await.unwrap();
        assert!(found.is_empty());
        assert_eq!(b.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_costs_nothing() {
        let b = bisector(&["p0"]);
        assert!(b.search(&[]).await.unwrap().is_empty());
        assert_eq!(b.probe_count(), 0);
    }

    #[tokio::test]
    async fn test_two_influential_names() {
        let b = bisector(&["p3", "p17"]);
        let mut found = b.search(&batch(32)).await.unwrap();
        found.sort();
        assert_eq!(found, vec!["p17", "p3"]);
    }

    #[tokio::test]
    async fn test_parallel_subtrees_find_the_same_names() {
        let b = bisector(&["p1", "p30", "p31"]).with_parallel_subtrees(true);
        let mut found = b.search(&batch(40)).await.unwrap();
        found.sort();
        assert_eq!(found, vec!["p1", "p30", "p31"]);
    }

    #[tokio::test]
    async fn test_probe_count_is_logarithmic() {
        let b = bisector(&["p63"]);
        let found = b.search(&batch(64)).await.unwrap();
        assert_eq!(found, vec!["p63"]);
        // Root plus both children on each of 6 levels.
        assert_eq!(b.probe_count(), 1 + 2 * 6);
    }
}
