// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Batch partitioner: packs candidate names into probe-sized batches.
//!
//! Greedy and lazy. Names are consumed in order; a batch is closed as soon
//! as the next name would push its encoded size past the capacity, and that
//! name opens the following batch.

use std::collections::HashSet;

use tracing::warn;

use crate::types::ParamSlot;

/// Remove repeated names, keeping the first occurrence of each.
pub fn dedup_candidates<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Encoded length of one `name=value` pair.
pub fn encoded_len(slot: &ParamSlot) -> usize {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair(&slot.name, &slot.value)
        .finish()
        .len()
}

/// Encoded size of a whole batch: every pair plus one `&` between pairs.
pub fn encoded_size(batch: &[ParamSlot]) -> usize {
    let pairs: usize = batch.iter().map(encoded_len).sum();
    pairs + batch.len().saturating_sub(1)
}

/// Partition `names` (already deduplicated) into batches whose encoded size
/// never exceeds `capacity`.
pub fn partition(names: Vec<String>, default_value: &str, capacity: usize) -> Partition {
    Partition {
        names: names.into_iter(),
        value: default_value.to_string(),
        capacity,
        carry: None,
        oversized: Vec::new(),
    }
}

/// Lazy batch sequence.
///
/// Names whose own encoding exceeds the capacity cannot be sent in any
/// probe; they are set aside in [`Partition::oversized`] instead.
#[derive(Debug)]
pub struct Partition {
    names: std::vec::IntoIter<String>,
    value: String,
    capacity: usize,
    carry: Option<(ParamSlot, usize)>,
    oversized: Vec<String>,
}

impl Partition {
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Names skipped so far because they alone exceed the capacity.
    pub fn oversized(&self) -> &[String] {
        &self.oversized
    }

    pub fn into_oversized(self) -> Vec<String> {
        self.oversized
    }
}

impl Iterator for Partition {
    type Item = Vec<ParamSlot>;

    fn next(&mut self) -> Option<Vec<ParamSlot>> {
        let mut batch = Vec::new();
        let mut size = 0usize;

        if let Some((slot, len)) = self.carry.take() {
            batch.push(slot);
            size = len;
        }

        for name in self.names.by_ref() {
            let slot = ParamSlot::new(name, self.value.clone());
            let len = encoded_len(&slot);

            if len > self.capacity {
                warn!(
                    bytes = len,
                    capacity = self.capacity,
                    "Candidate too long for any probe, skipping"
                );
                self.oversized.push(slot.name);
                continue;
            }

            let grown = if batch.is_empty() { len } else { size + 1 + len };
            if grown > self.capacity {
                self.carry = Some((slot, len));
                return Some(batch);
            }

            batch.push(slot);
            size = grown;
        }

        (!batch.is_empty()).then_some(batch)
    }
}
