// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core data types: the target under test, parameter slots and probe responses.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SiftError;

/// Content type under which parameters travel in the query string.
pub const URLENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Default desktop browser user-agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";

/// Default value assigned to every probed parameter.
pub const DEFAULT_PARAM_VALUE: &str = "1";

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Where probe parameters are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Appended to the URL query string.
    Query,
    /// Sent as a form-encoded request body.
    Body,
}

/// One parameter name with the value it is probed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamSlot {
    pub name: String,
    pub value: String,
}

impl ParamSlot {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The endpoint under test.
///
/// Built once before calibration; the probe client and calibrator only ever
/// read it.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: Url,
    pub method: Method,
    /// Extra request headers in send order (user-agent, cookie, auth, ...).
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub timeout: Duration,
    pub verify_tls: bool,
    pub default_value: String,
}

impl Target {
    /// Parse and validate a target URL with default settings (GET, no TLS
    /// verification, 10 s timeout, default value `"1"`).
    pub fn new(url: &str) -> Result<Self, SiftError> {
        let url = Url::parse(url)
            .map_err(|e| SiftError::InvalidTarget(format!("{url}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SiftError::InvalidTarget(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(SiftError::InvalidTarget(format!("{url}: missing host")));
        }

        Ok(Self {
            url,
            method: Method::GET,
            headers: vec![("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string())],
            content_type: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            verify_tls: false,
            default_value: DEFAULT_PARAM_VALUE.to_string(),
        })
    }

    pub fn with_method(mut self, method: &str) -> Result<Self, SiftError> {
        self.method = method
            .trim()
            .to_uppercase()
            .parse::<Method>()
            .map_err(|_| SiftError::InvalidTarget(format!("invalid HTTP method '{method}'")))?;
        Ok(self)
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        let trimmed = content_type.trim();
        self.content_type = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn with_user_agent(self, user_agent: &str) -> Self {
        self.with_header("User-Agent", user_agent)
    }

    /// Attach a raw `Cookie` header value. Pairs are normalised to
    /// `name=value; name=value`; malformed pairs are dropped.
    pub fn with_cookie(self, cookie: &str) -> Self {
        let pairs: Vec<String> = cookie
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some(format!("{name}={}", value.trim()))
            })
            .collect();
        if pairs.is_empty() {
            return self;
        }
        self.with_header("Cookie", &pairs.join("; "))
    }

    pub fn with_authorization(self, auth: &str) -> Self {
        if auth.trim().is_empty() {
            return self;
        }
        self.with_header("Authorization", auth.trim())
    }

    /// Set a header, replacing any existing header of the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_default_value(mut self, value: &str) -> Self {
        self.default_value = value.to_string();
        self
    }

    /// Parameters go in the body only for POST/PUT with a non-urlencoded
    /// content type; everything else uses the query string.
    pub fn placement(&self) -> Placement {
        let body_method = self.method == Method::POST || self.method == Method::PUT;
        match &self.content_type {
            Some(ct) if body_method && !ct.eq_ignore_ascii_case(URLENCODED_CONTENT_TYPE) => {
                Placement::Body
            }
            _ => Placement::Query,
        }
    }

    /// Length of `scheme://host[:port]`, which the server never counts
    /// against its request-line limit.
    pub fn origin_len(&self) -> usize {
        let mut len = self.url.scheme().len() + "://".len();
        len += self.url.host_str().map(str::len).unwrap_or(0);
        if let Some(port) = self.url.port() {
            len += 1 + port.to_string().len();
        }
        len
    }

    /// Build slots for the given names at the default value.
    pub fn slots<I, S>(&self, names: I) -> Vec<ParamSlot>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .map(|n| ParamSlot::new(n, self.default_value.clone()))
            .collect()
    }
}

/// A received response. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    /// All response headers, names lower-cased.
    pub headers: Vec<(String, String)>,
    /// Raw body bytes.
    pub body: Vec<u8>,
    /// Body decoded as (lossy) UTF-8.
    pub text: String,
    element_count: OnceLock<usize>,
}

impl ProbeResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        let text = String::from_utf8_lossy(&body).into_owned();
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self {
            status,
            headers,
            body,
            text,
            element_count: OnceLock::new(),
        }
    }

    /// Convenience constructor for a `200 OK` text response.
    pub fn ok(body: &str) -> Self {
        Self::new(200, Vec::new(), body.as_bytes().to_vec())
    }

    /// First header with the given (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Declared `Content-Length`, as sent.
    pub fn content_length(&self) -> Option<&str> {
        self.header("content-length").map(str::trim)
    }

    /// Number of element nodes in the parsed body, computed once.
    pub fn element_count(&self) -> usize {
        *self
            .element_count
            .get_or_init(|| crate::oracle::count_elements(&self.text))
    }

    /// 413 Payload Too Large or 414 URI Too Long.
    pub fn is_too_large(&self) -> bool {
        matches!(self.status, 413 | 414)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_defaults() {
        let t = Target::new("https://example.com/search?q=x").unwrap();
        assert_eq!(t.method, Method::GET);
        assert_eq!(t.default_value, "1");
        assert!(!t.verify_tls);
        assert_eq!(t.placement(), Placement::Query);
    }

    #[test]
    fn test_target_rejects_bad_urls() {
        assert!(matches!(
            Target::new("not a url"),
            Err(SiftError::InvalidTarget(_))
        ));
        assert!(matches!(
            Target::new("ftp://example.com/"),
            Err(SiftError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_placement_rules() {
        let base = Target::new("http://example.com/").unwrap();

        let post_json = base
            .clone()
            .with_method("post")
            .unwrap()
            .with_content_type("application/json");
        assert_eq!(post_json.placement(), Placement::Body);

        let post_form = base
            .clone()
            .with_method("POST")
            .unwrap()
            .with_content_type(URLENCODED_CONTENT_TYPE);
        assert_eq!(post_form.placement(), Placement::Query);

        let post_empty = base.clone().with_method("POST").unwrap().with_content_type("");
        assert_eq!(post_empty.placement(), Placement::Query);

        let get_json = base.with_content_type("application/json");
        assert_eq!(get_json.placement(), Placement::Query);
    }

    #[test]
    fn test_cookie_normalisation() {
        let t = Target::new("http://example.com/")
            .unwrap()
            .with_cookie(" session = abc ; broken; theme=dark");
        assert_eq!(t.header_value("cookie"), Some("session=abc; theme=dark"));
    }

    #[test]
    fn test_with_header_replaces() {
        let t = Target::new("http://example.com/")
            .unwrap()
            .with_user_agent("probe/1.0");
        let uas: Vec<_> = t
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("user-agent"))
            .collect();
        assert_eq!(uas.len(), 1);
        assert_eq!(uas[0].1, "probe/1.0");
    }

    #[test]
    fn test_origin_len() {
        let t = Target::new("http://example.com:8080/a/b").unwrap();
        assert_eq!(t.origin_len(), "http://example.com:8080".len());
        let t = Target::new("https://example.com/a").unwrap();
        assert_eq!(t.origin_len(), "https://example.com".len());
    }

    #[test]
    fn test_response_headers_case_insensitive() {
        let r = ProbeResponse::new(
            200,
            vec![("Content-Length".to_string(), "5".to_string())],
            b"hello".to_vec(),
        );
        assert_eq!(r.content_length(), Some("5"));
        assert_eq!(r.header("CONTENT-LENGTH"), Some("5"));
        assert_eq!(r.text, "hello");
    }

    #[test]
    fn test_too_large_statuses() {
        assert!(ProbeResponse::new(413, vec![], vec![]).is_too_large());
        assert!(ProbeResponse::new(414, vec![], vec![]).is_too_large());
        assert!(!ProbeResponse::new(400, vec![], vec![]).is_too_large());
    }

    impl Target {
        fn header_value(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }
}
