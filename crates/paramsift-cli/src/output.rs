// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Report printing for the discovery command.

use paramsift::Discovery;
use serde::Serialize;

/// Pretty-print a serialisable value to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Error: cannot serialise report: {e}"),
    }
}

#[derive(Serialize)]
struct Report<'a> {
    url: &'a str,
    example_request: &'a str,
    #[serde(flatten)]
    discovery: &'a Discovery,
}

pub fn print_json_report(url: &str, discovery: &Discovery, example_request: &str) {
    print_json(&Report {
        url,
        example_request,
        discovery,
    });
}

/// Human-readable summary.
pub fn render_report(discovery: &Discovery, example_request: &str) -> String {
    let mut out = String::new();

    if discovery.found.is_empty() {
        out.push_str(&format!(
            "No influential parameters among {} candidates ({} probes, {:.1}s)\n",
            discovery.candidates,
            discovery.probes,
            discovery.elapsed_ms as f64 / 1000.0
        ));
    } else {
        out.push_str(&format!(
            "Found {} influential parameter{} among {} candidates ({} probes, {:.1}s)\n",
            discovery.found.len(),
            if discovery.found.len() == 1 { "" } else { "s" },
            discovery.candidates,
            discovery.probes,
            discovery.elapsed_ms as f64 / 1000.0
        ));
        for name in &discovery.found {
            out.push_str(&format!("  {name}\n"));
        }
        out.push_str(&format!("\nExample request:\n  {}\n", example_request.replace('\n', "\n  ")));
    }

    if !discovery.failed_batches.is_empty() {
        let lost: usize = discovery.failed_batches.iter().map(|f| f.params).sum();
        out.push_str(&format!(
            "\nWarning: {} batch(es) failed, {lost} candidates were not searched\n",
            discovery.failed_batches.len()
        ));
        for failure in &discovery.failed_batches {
            out.push_str(&format!("  batch {}: {}\n", failure.batch, failure.error));
        }
    }

    if !discovery.oversized.is_empty() {
        out.push_str(&format!(
            "\nWarning: {} candidate(s) too long for a single probe: {}\n",
            discovery.oversized.len(),
            discovery.oversized.join(", ")
        ));
    }

    out
}
