// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Candidate harvesting from the baseline page.
//!
//! Pulls extra parameter-name candidates out of the page the target already
//! serves: `name` attributes of form controls and friends, and identifiers
//! from inline and same-origin external JavaScript. Best effort throughout;
//! unparsable input just yields fewer names.

use std::sync::OnceLock;

use futures::stream::{self, StreamExt};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::partition::dedup_candidates;
use crate::probe::ProbeClient;

/// Scripts fetched concurrently.
const FETCH_CONCURRENCY: usize = 5;

/// Scripts larger than this (5 MB) are skipped.
const MAX_SCRIPT_SIZE: usize = 5 * 1024 * 1024;

/// Default cap on external scripts fetched per page.
const DEFAULT_MAX_SCRIPTS: usize = 20;

/// Reserved words and literals never reported as identifiers.
const JS_RESERVED: &[&str] = &[
    "abstract", "arguments", "async", "await", "boolean", "break", "byte", "case", "catch",
    "char", "class", "const", "continue", "debugger", "default", "delete", "do", "double",
    "else", "enum", "eval", "export", "extends", "false", "final", "finally", "float", "for",
    "function", "goto", "if", "implements", "import", "in", "instanceof", "int", "interface",
    "let", "long", "native", "new", "null", "of", "package", "private", "protected", "public",
    "return", "short", "static", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "true", "try", "typeof", "undefined", "var", "void", "volatile", "while",
    "with", "yield",
];

/// Scripts found in a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptSources {
    /// Bodies of `<script>` elements without `src`.
    pub inline: Vec<String>,
    /// Resolved same-origin `src` URLs.
    pub external: Vec<String>,
}

/// Every non-empty `name` attribute, in document order.
pub fn names_from_html(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let sel = Selector::parse("[name]").expect("valid selector");
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("name"))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn js_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Alternatives are tried left to right: comments, string and template
        // literals and numbers are consumed whole so their contents never
        // surface as identifiers.
        Regex::new(concat!(
            r"(?s)//[^\n]*",
            r"|/\*.*?\*/",
            r#"|"(?:\\.|[^"\\])*""#,
            r"|'(?:\\.|[^'\\])*'",
            r"|`(?:\\.|[^`\\])*`",
            r"|\b[0-9][0-9A-Za-z_.]*",
            r"|([A-Za-z_$][A-Za-z0-9_$]*)",
        ))
        .expect("valid regex")
    })
}

/// Identifier tokens of a JavaScript source, deduplicated in order of first
/// appearance. Non-JS input never errors.
pub fn identifiers_from_js(source: &str) -> Vec<String> {
    let idents = js_token_regex()
        .captures_iter(source)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|ident| !JS_RESERVED.contains(ident));
    dedup_candidates(idents)
}

/// Split the page's scripts into inline bodies and fetchable URLs.
pub fn script_sources(html: &str, base_url: &str) -> ScriptSources {
    let document = Html::parse_document(html);
    let sel = Selector::parse("script").expect("valid selector");
    let mut sources = ScriptSources::default();

    for el in document.select(&sel) {
        match el.value().attr("src") {
            Some(src) => {
                let resolved = resolve_script_url(src.trim(), base_url);
                if is_analytics_or_cdn(&resolved) || !is_same_origin(&resolved, base_url) {
                    debug!(src = %resolved, "Skipping third-party script");
                    continue;
                }
                if !sources.external.contains(&resolved) {
                    sources.external.push(resolved);
                }
            }
            None => {
                let body: String = el.text().collect();
                if !body.trim().is_empty() {
                    sources.inline.push(body);
                }
            }
        }
    }

    sources
}

/// Check if a script URL is from the same host as the base URL.
fn is_same_origin(script_url: &str, base_url: &str) -> bool {
    let script_parsed = match url::Url::parse(script_url) {
        Ok(u) => u,
        Err(_) => return false,
    };
    let base_parsed = match url::Url::parse(base_url) {
        Ok(u) => u,
        Err(_) => return false,
    };

    script_parsed.host_str() == base_parsed.host_str()
}

/// Known analytics, tag-manager and public CDN scripts. Their identifiers
/// describe the library, not the target.
fn is_analytics_or_cdn(url: &str) -> bool {
    const SKIP_PATTERNS: &[&str] = &[
        "google-analytics.com",
        "googletagmanager.com",
        "googlesyndication.com",
        "googleadservices.com",
        "google.com/recaptcha",
        "gstatic.com",
        "facebook.net",
        "fbcdn.net",
        "hotjar.com",
        "segment.com",
        "segment.io",
        "cdnjs.cloudflare.com",
        "unpkg.com",
        "cdn.jsdelivr.net",
        "ajax.googleapis.com",
        "bootstrapcdn.com",
        "code.jquery.com",
        "newrelic.com",
        "nr-data.net",
        "sentry-cdn.com",
        "clarity.ms",
        "doubleclick.net",
    ];

    let lower = url.to_lowercase();
    SKIP_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

/// Resolve a script `src` against the page URL. Protocol-relative sources
/// inherit the page's scheme.
fn resolve_script_url(src: &str, base_url: &str) -> String {
    if src.starts_with("http://") || src.starts_with("https://") {
        return src.to_string();
    }

    if let Ok(base) = url::Url::parse(base_url) {
        if let Some(rest) = src.strip_prefix("//") {
            return format!("{}://{rest}", base.scheme());
        }
        if let Ok(resolved) = base.join(src) {
            return resolved.to_string();
        }
    }

    format!("{}/{}", base_url.trim_end_matches('/'), src.trim_start_matches('/'))
}

/// Harvests candidates from a baseline body.
#[derive(Debug, Clone)]
pub struct Harvester {
    pub html: bool,
    pub js: bool,
    pub max_scripts: usize,
}

impl Default for Harvester {
    fn default() -> Self {
        Self {
            html: true,
            js: true,
            max_scripts: DEFAULT_MAX_SCRIPTS,
        }
    }
}

impl Harvester {
    pub fn new(html: bool, js: bool) -> Self {
        Self {
            html,
            js,
            ..Self::default()
        }
    }

    /// Names from the page markup and its scripts, deduplicated. External
    /// scripts go through `client`; fetch failures are skipped.
    pub async fn harvest<C: ProbeClient + ?Sized>(
        &self,
        html: &str,
        base_url: &str,
        client: &C,
    ) -> Vec<String> {
        let mut names = Vec::new();

        if self.html {
            let page = html.to_string();
            let found = tokio::task::spawn_blocking(move || names_from_html(&page))
                .await
                .unwrap_or_default();
            info!(count = found.len(), "Names harvested from HTML");
            names.extend(found);
        }

        if self.js {
            let page = html.to_string();
            let base = base_url.to_string();
            let sources = tokio::task::spawn_blocking(move || script_sources(&page, &base))
                .await
                .unwrap_or_default();
            let mut bodies = sources.inline;

            let urls: Vec<String> = sources.external.into_iter().take(self.max_scripts).collect();
            let fetched: Vec<(String, Result<String, _>)> = stream::iter(urls)
                .map(|url| async move {
                    let result = client.fetch_text(&url).await;
                    (url, result)
                })
                .buffer_unordered(FETCH_CONCURRENCY)
                .collect()
                .await;

            for (url, result) in fetched {
                match result {
                    Ok(body) if body.len() <= MAX_SCRIPT_SIZE => bodies.push(body),
                    Ok(body) => {
                        debug!(%url, bytes = body.len(), "Script too large, skipped");
                    }
                    Err(e) => warn!(%url, error = %e, "Script fetch failed"),
                }
            }

            let js_names = tokio::task::spawn_blocking(move || {
                dedup_candidates(bodies.iter().flat_map(|body| identifiers_from_js(body)))
            })
            .await
            .unwrap_or_default();
            info!(count = js_names.len(), "Identifiers harvested from JavaScript");
            names.extend(js_names);
        }

        dedup_candidates(names)
    }
}
