// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run artifacts: the example request for the found parameters and the
//! optional dump of the merged candidate list.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::SiftError;
use crate::probe::encode_form;
use crate::types::{Placement, Target};

/// A request that exercises every name in `found` at the target's default
/// value. Query placement yields a bare URL; body placement yields
/// `METHOD URL`, a blank line and the form body.
pub fn example_request(target: &Target, found: &[String]) -> String {
    let slots = target.slots(found.iter().cloned());

    match target.placement() {
        Placement::Query => {
            let mut url = target.url.clone();
            if !slots.is_empty() {
                url.query_pairs_mut()
                    .extend_pairs(slots.iter().map(|p| (p.name.as_str(), p.value.as_str())));
            }
            url.to_string()
        }
        Placement::Body => format!("{} {}\n\n{}", target.method, target.url, encode_form(&slots)),
    }
}

/// Write `names` one per line, replacing any existing file.
pub fn save_candidates(path: &Path, names: &[String]) -> Result<(), SiftError> {
    let mut file = fs::File::create(path)?;
    for name in names {
        writeln!(file, "{name}")?;
    }
    file.flush()?;
    info!(path = %path.display(), count = names.len(), "Candidates saved");
    Ok(())
}
