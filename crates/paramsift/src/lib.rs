// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Paramsift: hidden HTTP parameter discovery by calibrated bisection.
//!
//! Given a target endpoint and a universe of candidate parameter names, the
//! library calibrates a response-equivalence oracle against the target, sizes
//! the largest probe it will accept, packs candidates into batches under that
//! budget and bisects every batch that changes the response until only the
//! influential names remain.

pub mod artifact;
pub mod bisect;
pub mod calibrate;
pub mod config;
pub mod error;
pub mod finder;
pub mod harvest;
pub mod oracle;
pub mod orchestrator;
pub mod partition;
pub mod probe;
pub mod progress;
pub mod types;

pub use artifact::{example_request, save_candidates};
pub use bisect::Bisector;
pub use calibrate::{random_param_name, Calibration, Calibrator};
pub use config::SiftConfig;
pub use error::{CalibrationFailure, ProbeError, SiftError};
pub use finder::{Discovery, ParamFinder};
pub use harvest::Harvester;
pub use oracle::{EquivalenceOracle, MetricPredicate};
pub use orchestrator::{BatchFailure, SearchOutcome};
pub use partition::{dedup_candidates, encoded_size, partition, Partition};
pub use probe::{HttpProbeClient, ProbeClient};
pub use types::{ParamSlot, Placement, ProbeResponse, Target};
