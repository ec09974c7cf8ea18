// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Paramsift: hidden HTTP parameter discovery.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser};
use clap_complete::Shell;

mod discover;
mod output;
mod progress;

#[derive(Parser, Debug)]
#[command(
    name = "paramsift",
    about = "Paramsift: find the hidden parameters an HTTP endpoint reacts to",
    version,
    after_help = "Examples:\n  paramsift -u https://example.com/search -f params.txt\n  paramsift -u https://example.com/api -m POST --content-type application/json"
)]
pub(crate) struct Cli {
    /// Target URL
    #[arg(short, long, required_unless_present = "completions")]
    pub url: Option<String>,

    /// HTTP method
    #[arg(short, long, default_value = "GET")]
    pub method: String,

    /// Cookie header value (e.g. "session=abc; theme=dark")
    #[arg(short, long)]
    pub cookie: Option<String>,

    /// User-Agent header value
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Content-Type of the request; POST/PUT with a non-form type sends parameters in the body
    #[arg(long)]
    pub content_type: Option<String>,

    /// Value assigned to every probed parameter
    #[arg(short = 'd', long = "default", default_value = paramsift::types::DEFAULT_PARAM_VALUE)]
    pub default_value: String,

    /// Wordlist of candidate names, one per line
    #[arg(short, long, default_value = "params.txt")]
    pub file: PathBuf,

    /// Per-request timeout in milliseconds
    #[arg(short, long, default_value_t = paramsift::types::DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Authorization header value
    #[arg(short, long)]
    pub auth: Option<String>,

    /// Extra header as 'Name: value'. Can be repeated.
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Concurrent batches (also PARAMSIFT_WORKERS)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Verify TLS certificates
    #[arg(long)]
    pub verify_tls: bool,

    /// Do not harvest names from the page markup
    #[arg(long)]
    pub no_html: bool,

    /// Do not harvest identifiers from page scripts
    #[arg(long)]
    pub no_js: bool,

    /// Write the merged candidate list to this file before searching
    #[arg(long)]
    pub save_candidates: Option<PathBuf>,

    /// Seed for calibration parameter names
    #[arg(long)]
    pub seed: Option<u64>,

    /// Search both halves of a bisection node concurrently
    #[arg(long)]
    pub parallel_subtrees: bool,

    /// Output results as JSON (machine-readable)
    #[arg(long)]
    pub json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Generate shell completion scripts (bash, zsh, fish, powershell, elvish)
    #[arg(long, value_name = "SHELL")]
    pub completions: Option<Shell>,
}

fn init_tracing(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "paramsift", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.verbose, cli.log_json);

    let result = discover::run(&cli).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli.json {
            output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["paramsift", "-u", "http://example.com/"]).unwrap();
        assert_eq!(cli.method, "GET");
        assert_eq!(cli.default_value, "1");
        assert_eq!(cli.file, PathBuf::from("params.txt"));
        assert_eq!(cli.timeout, 10_000);
        assert_eq!(cli.verbose, 0);
        assert!(cli.workers.is_none());
        assert!(!cli.verify_tls);
    }

    #[test]
    fn test_repeated_flags() {
        let cli = Cli::try_parse_from([
            "paramsift",
            "-u",
            "http://example.com/",
            "-vv",
            "-H",
            "X-One: 1",
            "-H",
            "X-Two: 2",
            "-w",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.headers, vec!["X-One: 1", "X-Two: 2"]);
        assert_eq!(cli.workers, Some(4));
    }

    #[test]
    fn test_url_required_without_completions() {
        assert!(Cli::try_parse_from(["paramsift"]).is_err());
        assert!(Cli::try_parse_from(["paramsift", "--completions", "bash"]).is_ok());
    }
}
