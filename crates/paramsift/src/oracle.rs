// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Response equivalence oracle.
//!
//! Two responses are "the same" when every active metric says so. The
//! metric catalogue is fixed; calibration filters it down to the metrics
//! that stay stable on this target and the survivors are frozen into an
//! [`EquivalenceOracle`] for the rest of the run.

use std::fmt;
use std::sync::Arc;

use scraper::Html;
use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffTag, TextDiff};

use crate::error::SiftError;
use crate::types::ProbeResponse;

/// One way of comparing two responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricPredicate {
    /// Declared `Content-Length` and raw body length both match.
    ContentLength,
    /// Fuzzy similarity ratio of the decoded bodies rounds to 100%.
    TextSimilarity,
    /// Same number of element nodes in the parsed markup.
    ElementCount,
}

impl MetricPredicate {
    /// The full catalogue, in evaluation order (cheapest first).
    pub const CATALOG: [MetricPredicate; 3] = [
        MetricPredicate::ContentLength,
        MetricPredicate::ElementCount,
        MetricPredicate::TextSimilarity,
    ];

    /// True when `a` and `b` look the same through this metric.
    ///
    /// CPU-bound for the markup and text metrics; async callers go through
    /// [`EquivalenceOracle::judge`] or `spawn_blocking`.
    pub fn holds(&self, a: &ProbeResponse, b: &ProbeResponse) -> bool {
        match self {
            Self::ContentLength => {
                a.content_length() == b.content_length() && a.body.len() == b.body.len()
            }
            Self::TextSimilarity => texts_match(&a.text, &b.text),
            Self::ElementCount => a.element_count() == b.element_count(),
        }
    }
}

impl fmt::Display for MetricPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentLength => write!(f, "content-length"),
            Self::TextSimilarity => write!(f, "text-similarity"),
            Self::ElementCount => write!(f, "element-count"),
        }
    }
}

/// Similarity of two texts as a rounded percentage (0..=100).
///
/// Character-level ratio `2*M / T`, with `M` matched characters and `T` the
/// combined length, the same measure as a sequence matcher. Rounds half up.
/// Exact, with no time budget: cost grows with the size of the difference,
/// so verdicts on large bodies go through [`texts_match`] instead.
pub fn similarity_percent(a: &str, b: &str) -> u8 {
    if a == b {
        return 100;
    }
    let total = a.chars().count() + b.chars().count();
    let distance = edit_distance(a, b, total).unwrap_or(total);
    rounded_percent(total - distance, total)
}

/// True iff [`similarity_percent`] would return 100.
///
/// That holds exactly when the edit distance is at most `T / 200`, so the
/// search gives up as soon as the distance passes that bound.
pub fn texts_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let total = a.chars().count() + b.chars().count();
    edit_distance(a, b, total / 200).is_some()
}

/// `round(100 * kept / total)`, half up, in integers.
fn rounded_percent(kept: usize, total: usize) -> u8 {
    let (kept, total) = (kept as u64, total as u64);
    ((200 * kept + total) / (2 * total)).min(100) as u8
}

/// Insert/delete edit distance between `a` and `b`, or `None` once it
/// exceeds `limit`.
///
/// Lines are aligned first; changed hunks are then compared character by
/// character against whatever is left of `limit`.
fn edit_distance(a: &str, b: &str, limit: usize) -> Option<usize> {
    let lines = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(a, b);
    let old_lines = lines.old_slices();
    let new_lines = lines.new_slices();
    let chars = |hunk: &[&str]| -> Vec<char> { hunk.iter().flat_map(|l| l.chars()).collect() };

    let mut distance = 0usize;
    for op in lines.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        distance += match tag {
            DiffTag::Equal => 0,
            DiffTag::Delete => chars(&old_lines[old_range]).len(),
            DiffTag::Insert => chars(&new_lines[new_range]).len(),
            DiffTag::Replace => char_distance(
                &chars(&old_lines[old_range]),
                &chars(&new_lines[new_range]),
                limit.checked_sub(distance)?,
            )?,
        };
        if distance > limit {
            return None;
        }
    }
    Some(distance)
}

/// Greedy Myers over characters: the smallest number of insertions and
/// deletions turning `a` into `b`, or `None` if it exceeds `limit`.
/// O((N+M)·D) time and O(limit) space.
fn char_distance(a: &[char], b: &[char], limit: usize) -> Option<usize> {
    let (n, m) = (a.len() as isize, b.len() as isize);
    if n.abs_diff(m) > limit {
        return None;
    }
    let max = limit.min(a.len() + b.len()) as isize;
    let offset = max + 1;
    // Furthest x reached on each diagonal k = x - y.
    let mut furthest = vec![0isize; 2 * max as usize + 3];

    for d in 0..=max {
        for k in (-d..=d).step_by(2) {
            let i = (k + offset) as usize;
            let mut x = if k == -d || (k != d && furthest[i - 1] < furthest[i + 1]) {
                furthest[i + 1]
            } else {
                furthest[i - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            furthest[i] = x;
            if x >= n && y >= m {
                return Some(d as usize);
            }
        }
    }
    None
}

/// Count element nodes in a body parsed as an HTML document.
///
/// Parsing follows the HTML5 tree-construction rules, so implied `html`,
/// `head` and `body` elements are counted too.
pub fn count_elements(text: &str) -> usize {
    let document = Html::parse_document(text);
    document
        .tree
        .nodes()
        .filter(|node| node.value().is_element())
        .count()
}

/// Conjunction of the metrics that survived calibration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceOracle {
    metrics: Vec<MetricPredicate>,
}

impl EquivalenceOracle {
    /// Freeze a metric selection. An empty selection cannot judge anything
    /// and is rejected.
    pub fn new(metrics: Vec<MetricPredicate>) -> Result<Self, SiftError> {
        if metrics.is_empty() {
            return Err(SiftError::OracleEmpty);
        }
        Ok(Self { metrics })
    }

    pub fn metrics(&self) -> &[MetricPredicate] {
        &self.metrics
    }

    /// True iff every active metric holds.
    pub fn is_same(&self, a: &ProbeResponse, b: &ProbeResponse) -> bool {
        self.metrics.iter().all(|m| m.holds(a, b))
    }

    /// [`is_same`](Self::is_same) on the blocking pool.
    pub async fn judge(&self, baseline: Arc<ProbeResponse>, response: Arc<ProbeResponse>) -> bool {
        let oracle = self.clone();
        let handle =
            tokio::task::spawn_blocking(move || oracle.is_same(&baseline, &response));
        match handle.await {
            Ok(same) => same,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // Runtime shutting down.
            Err(_) => false,
        }
    }
}
