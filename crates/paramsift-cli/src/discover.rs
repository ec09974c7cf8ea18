// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! The discovery command: wordlist in, influential parameters out.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use paramsift::config::resolve_workers;
use paramsift::progress::{self, ProgressReporter};
use paramsift::{
    dedup_candidates, example_request, save_candidates, Harvester, HttpProbeClient, ParamFinder,
    SiftConfig, Target,
};
use tracing::info;

use crate::output;
use crate::Cli;

/// Non-blank, trimmed lines of a wordlist.
pub fn read_wordlist(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read wordlist {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Split `Name: value` into its parts.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("invalid header '{raw}', expected 'Name: value'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("invalid header '{raw}', empty name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub fn build_target(cli: &Cli) -> Result<Target> {
    let url = cli.url.as_deref().context("a target URL is required (-u)")?;

    let mut target = Target::new(url)?
        .with_method(&cli.method)?
        .with_timeout(Duration::from_millis(cli.timeout))
        .with_verify_tls(cli.verify_tls)
        .with_default_value(&cli.default_value);

    if let Some(ct) = &cli.content_type {
        target = target.with_content_type(ct);
    }
    if let Some(ua) = &cli.user_agent {
        target = target.with_user_agent(ua);
    }
    if let Some(cookie) = &cli.cookie {
        target = target.with_cookie(cookie);
    }
    if let Some(auth) = &cli.auth {
        target = target.with_authorization(auth);
    }
    for raw in &cli.headers {
        let (name, value) = parse_header(raw)?;
        target = target.with_header(&name, &value);
    }

    Ok(target)
}

pub async fn run(cli: &Cli) -> Result<()> {
    let wordlist = read_wordlist(&cli.file)?;
    let target = Arc::new(build_target(cli)?);
    let config = SiftConfig {
        workers: resolve_workers(cli.workers),
        calibration_seed: cli.seed,
        parallel_subtrees: cli.parallel_subtrees,
        ..SiftConfig::default()
    };
    config.validate()?;

    info!(url = %target.url, words = wordlist.len(), placement = ?target.placement(), "Starting discovery");

    let client = Arc::new(HttpProbeClient::new(Arc::clone(&target))?);

    let show_bar = !cli.json && cli.verbose == 0 && std::io::stderr().is_terminal();
    let (tx, rx) = progress::channel();
    let renderer = show_bar.then(|| crate::progress::spawn_renderer(rx));
    let reporter = Arc::new(ProgressReporter::new(show_bar.then_some(tx)));

    let outcome = search(cli, client, Arc::clone(&target), config, reporter, wordlist).await;

    // All senders are gone once `search` returns, which ends the renderer.
    if let Some(handle) = renderer {
        let _ = handle.await;
    }

    let discovery = outcome?;
    let example = example_request(&target, &discovery.found);
    if cli.json {
        output::print_json_report(target.url.as_str(), &discovery, &example);
    } else {
        print!("{}", output::render_report(&discovery, &example));
    }

    Ok(())
}

async fn search(
    cli: &Cli,
    client: Arc<HttpProbeClient>,
    target: Arc<Target>,
    config: SiftConfig,
    reporter: Arc<ProgressReporter>,
    wordlist: Vec<String>,
) -> Result<paramsift::Discovery> {
    // Harvested names are only known after calibration, so trial names avoid
    // the wordlist alone.
    let finder = ParamFinder::calibrate(client, target, config, reporter, &wordlist)
        .await
        .context("calibration failed")?;

    let harvester = Harvester::new(!cli.no_html, !cli.no_js);
    let harvested = if harvester.html || harvester.js {
        finder.harvest(&harvester).await
    } else {
        Vec::new()
    };

    let before = wordlist.len();
    let candidates = dedup_candidates(wordlist.into_iter().chain(harvested));
    info!(
        wordlist = before,
        total = candidates.len(),
        "Common count of candidates"
    );

    if let Some(path) = &cli.save_candidates {
        save_candidates(path, &candidates)
            .with_context(|| format!("cannot write candidates to {}", path.display()))?;
    }

    Ok(finder.find(candidates).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_read_wordlist_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "id\n\n  debug  \n\t\nformat\n").unwrap();
        let words = read_wordlist(file.path()).unwrap();
        assert_eq!(words, vec!["id", "debug", "format"]);
    }

    #[test]
    fn test_read_wordlist_missing_file() {
        let err = read_wordlist(Path::new("/nonexistent/params.txt")).unwrap_err();
        assert!(format!("{err:#}").contains("cannot read wordlist"));
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("X-Api-Key:  abc:def ").unwrap(),
            ("X-Api-Key".to_string(), "abc:def".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_build_target_from_flags() {
        let cli = Cli::try_parse_from([
            "paramsift",
            "-u",
            "http://example.com/api",
            "-m",
            "post",
            "--content-type",
            "application/json",
            "-c",
            "a=b; c=d",
            "-a",
            "Bearer t",
            "-H",
            "X-Trace: 1",
            "-t",
            "2500",
        ])
        .unwrap();
        let target = build_target(&cli).unwrap();
        assert_eq!(target.method.as_str(), "POST");
        assert_eq!(target.placement(), paramsift::Placement::Body);
        assert_eq!(target.timeout, Duration::from_millis(2500));
        let header = |name: &str| {
            target
                .headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        };
        assert_eq!(header("cookie").as_deref(), Some("a=b; c=d"));
        assert_eq!(header("authorization").as_deref(), Some("Bearer t"));
        assert_eq!(header("x-trace").as_deref(), Some("1"));
    }

    #[test]
    fn test_build_target_rejects_bad_url() {
        let cli = Cli::try_parse_from(["paramsift", "-u", "ftp://example.com/"]).unwrap();
        assert!(build_target(&cli).is_err());
    }
}
