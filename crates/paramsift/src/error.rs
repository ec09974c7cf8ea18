// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for calibration, probing and configuration.

/// A network-level failure on a single probe request.
///
/// Probes are never retried; the error propagates to whoever issued the probe.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("TLS handshake with {url} failed: {message}")]
    Tls { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("reading response body from {url} failed: {message}")]
    Body { url: String, message: String },
}

impl ProbeError {
    /// Classify a reqwest error for the given request URL.
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        let url = url.to_string();
        let message = format!("{err}");
        if err.is_timeout() {
            return Self::Timeout { url };
        }
        if err.is_body() || err.is_decode() {
            return Self::Body { url, message };
        }
        // reqwest does not expose a TLS predicate; the cause text is the only signal.
        if let Some(causes) = tls_cause(err) {
            return Self::Tls {
                url,
                message: causes,
            };
        }
        if err.is_connect() {
            return Self::Connect { url, message };
        }
        Self::Request { url, message }
    }

    /// URL of the request that failed.
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Connect { url, .. }
            | Self::Tls { url, .. }
            | Self::Request { url, .. }
            | Self::Body { url, .. } => url,
        }
    }
}

/// Text of the causes below `err` when any of them mentions TLS or a
/// certificate. The top-level message is skipped: it embeds the request URL.
fn tls_cause(err: &(dyn std::error::Error + 'static)) -> Option<String> {
    let causes = err.source().map(error_chain_text)?;
    (causes.contains("certificate") || causes.contains("tls") || causes.contains("TLS"))
        .then_some(causes)
}

fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

/// Reasons the startup calibration could not produce a usable configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationFailure {
    #[error("baseline request failed: {0}")]
    Baseline(#[source] ProbeError),

    #[error("metric trial request failed: {0}")]
    Trial(#[source] ProbeError),

    #[error("target rejects probe payloads even at the {floor}-byte floor")]
    PayloadFloor { floor: usize },

    #[error("a {buffer_size}-byte buffer leaves no room for parameters after the base URL")]
    InvalidCapacity { buffer_size: usize },
}

/// All errors surfaced by the discovery engine.
#[derive(thiserror::Error, Debug)]
pub enum SiftError {
    #[error("calibration failed: {0}")]
    Calibration(#[from] CalibrationFailure),

    #[error("no comparison metric is stable for this target (responses vary between identical requests)")]
    OracleEmpty,

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SiftError {
    /// True for the failures that abort a run before any batch is searched.
    pub fn is_fatal_calibration(&self) -> bool {
        matches!(self, Self::Calibration(_) | Self::OracleEmpty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_calibration_classification() {
        assert!(SiftError::OracleEmpty.is_fatal_calibration());
        assert!(
            SiftError::Calibration(CalibrationFailure::PayloadFloor { floor: 256 })
                .is_fatal_calibration()
        );
        let probe = ProbeError::Timeout {
            url: "http://t/".to_string(),
        };
        assert!(!SiftError::Probe(probe).is_fatal_calibration());
        assert!(!SiftError::InvalidConfig("x".into()).is_fatal_calibration());
    }

    #[derive(Debug)]
    struct Layer {
        message: &'static str,
        source: Option<Box<Layer>>,
    }

    impl std::fmt::Display for Layer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.message)
        }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.source.as_deref().map(|e| e as _)
        }
    }

    fn layered(top: &'static str, causes: &[&'static str]) -> Layer {
        let source = causes
            .iter()
            .rev()
            .fold(None, |inner, message| {
                Some(Box::new(Layer {
                    message,
                    source: inner,
                }))
            });
        Layer {
            message: top,
            source,
        }
    }

    #[test]
    fn test_tls_cause_ignores_url_in_top_message() {
        let err = layered(
            "error sending request for url (http://127.0.0.1:1/tls-x)",
            &["client error (Connect)", "tcp connect error: Connection refused"],
        );
        assert_eq!(tls_cause(&err), None);

        let bare = layered("error sending request for url (http://h/tls)", &[]);
        assert_eq!(tls_cause(&bare), None);
    }

    #[test]
    fn test_tls_cause_found_in_source() {
        let err = layered(
            "error sending request for url (https://h/)",
            &["client error (Connect)", "invalid peer certificate: UnknownIssuer"],
        );
        assert_eq!(
            tls_cause(&err).as_deref(),
            Some("client error (Connect): invalid peer certificate: UnknownIssuer")
        );
    }

    #[test]
    fn test_probe_error_url_and_display() {
        let err = ProbeError::Connect {
            url: "http://example.test/".to_string(),
            message: "refused".to_string(),
        };
        assert_eq!(err.url(), "http://example.test/");
        assert_eq!(
            err.to_string(),
            "connection to http://example.test/ failed: refused"
        );
    }

    #[test]
    fn test_calibration_failure_wraps_into_sift_error() {
        let err: SiftError = CalibrationFailure::PayloadFloor { floor: 128 }.into();
        assert!(err.to_string().contains("128-byte floor"));
    }
}
