// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal rendering of library progress events.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use paramsift::progress::{ProgressEventKind, ProgressReceiver};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} candidates ({percent}%) {msg} | ETA: {eta}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Candidates an event removes from the search backlog.
fn candidates_settled(event: &ProgressEventKind) -> u64 {
    match event {
        ProgressEventKind::BatchCompleted { params, .. }
        | ProgressEventKind::BatchFailed { params, .. } => *params as u64,
        ProgressEventKind::OversizedSkipped { count } => *count as u64,
        _ => 0,
    }
}

/// Consume events until the channel closes, drawing a spinner during
/// calibration and a candidate bar during the search.
pub fn spawn_renderer(mut rx: ProgressReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pb = ProgressBar::new_spinner();
        pb.set_style(spinner_style());
        pb.enable_steady_tick(Duration::from_millis(120));

        let mut found = 0usize;
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };

            pb.inc(candidates_settled(&event.event));
            match event.event {
                ProgressEventKind::PhaseStarted { phase, message } => {
                    pb.set_message(format!("{phase}: {message}"));
                }
                ProgressEventKind::MetricRejected {
                    metric,
                    trial_param,
                } => {
                    pb.println(format!("  metric {metric} unstable (trial {trial_param})"));
                }
                ProgressEventKind::CapacityProbe {
                    buffer_size,
                    accepted,
                    ..
                } => {
                    let verdict = if accepted { "accepted" } else { "rejected" };
                    pb.set_message(format!("Capacity Estimation: {buffer_size} bytes {verdict}"));
                }
                ProgressEventKind::SearchPlanned { candidates, .. } => {
                    pb.set_style(bar_style());
                    pb.set_length(candidates as u64);
                    pb.set_position(0);
                    pb.set_message("0 found");
                }
                ProgressEventKind::BatchCompleted { found: names, .. } => {
                    for name in &names {
                        pb.println(format!("  found: {name}"));
                    }
                    found += names.len();
                    pb.set_message(format!("{found} found"));
                }
                ProgressEventKind::BatchFailed { batch, error, .. } => {
                    pb.println(format!("  batch {batch} failed: {error}"));
                }
                ProgressEventKind::OversizedSkipped { count } => {
                    pb.println(format!("  warning: {count} candidates exceed the probe capacity"));
                }
                ProgressEventKind::Warning { message } => {
                    pb.println(format!("  warning: {message}"));
                }
                ProgressEventKind::DiscoveryComplete { .. } => {
                    pb.finish_and_clear();
                }
                ProgressEventKind::PhaseCompleted { .. } => {}
            }
        }

        if !pb.is_finished() {
            pb.finish_and_clear();
        }
    })
}
