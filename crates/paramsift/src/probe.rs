// Copyright 2026 Paramsift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Probe client: one HTTP request per parameter set.
//!
//! Not a browser and not a crawler. Redirects are never followed, so a 30x
//! is compared as-is, and nothing is retried: a transport failure surfaces
//! as a [`ProbeError`] for the caller to deal with.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::error::{ProbeError, SiftError};
use crate::types::{ParamSlot, Placement, ProbeResponse, Target};

/// Anything that can send a parameter set to the target and hand back the
/// response. The HTTP implementation is [`HttpProbeClient`]; tests plug in
/// synthetic ones.
#[async_trait]
pub trait ProbeClient: Send + Sync {
    /// Send one request carrying `params` (empty for the baseline).
    async fn send(&self, params: &[ParamSlot]) -> Result<ProbeResponse, ProbeError>;

    /// Plain GET of an auxiliary resource (external scripts during harvest).
    async fn fetch_text(&self, url: &str) -> Result<String, ProbeError> {
        Err(ProbeError::Request {
            url: url.to_string(),
            message: "this probe client cannot fetch auxiliary resources".to_string(),
        })
    }
}

#[async_trait]
impl<C: ProbeClient + ?Sized> ProbeClient for Arc<C> {
    async fn send(&self, params: &[ParamSlot]) -> Result<ProbeResponse, ProbeError> {
        (**self).send(params).await
    }

    async fn fetch_text(&self, url: &str) -> Result<String, ProbeError> {
        (**self).fetch_text(url).await
    }
}

/// Probe client backed by reqwest.
#[derive(Clone)]
pub struct HttpProbeClient {
    client: reqwest::Client,
    target: Arc<Target>,
}

impl HttpProbeClient {
    /// Build a client bound to the target's timeout and TLS settings.
    pub fn new(target: Arc<Target>) -> Result<Self, SiftError> {
        let client = reqwest::Client::builder()
            .timeout(target.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(!target.verify_tls)
            .build()
            .map_err(|e| SiftError::InvalidConfig(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { client, target })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    fn build_request(&self, params: &[ParamSlot]) -> (String, reqwest::RequestBuilder) {
        let target = &self.target;
        let mut url = target.url.clone();

        let builder = match target.placement() {
            Placement::Query => {
                if !params.is_empty() {
                    url.query_pairs_mut().extend_pairs(
                        params.iter().map(|p| (p.name.as_str(), p.value.as_str())),
                    );
                }
                self.client.request(target.method.clone(), url.clone())
            }
            Placement::Body => self
                .client
                .request(target.method.clone(), url.clone())
                .body(encode_form(params)),
        };

        let mut builder = builder;
        for (name, value) in &target.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ct) = &target.content_type {
            builder = builder.header(CONTENT_TYPE, ct.as_str());
        }

        (url.to_string(), builder)
    }
}

#[async_trait]
impl ProbeClient for HttpProbeClient {
    async fn send(&self, params: &[ParamSlot]) -> Result<ProbeResponse, ProbeError> {
        let (url, builder) = self.build_request(params);

        let r = builder
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(&url, &e))?;

        let status = r.status().as_u16();
        let headers: Vec<(String, String)> = r
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body = r
            .bytes()
            .await
            .map_err(|e| ProbeError::from_reqwest(&url, &e))?
            .to_vec();

        debug!(
            params = params.len(),
            status,
            bytes = body.len(),
            "probe {}",
            truncate_for_log(&url)
        );

        Ok(ProbeResponse::new(status, headers, body))
    }

    async fn fetch_text(&self, url: &str) -> Result<String, ProbeError> {
        let mut builder = self.client.get(url);
        for (name, value) in &self.target.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let r = builder
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(url, &e))?;

        if !r.status().is_success() {
            return Err(ProbeError::Request {
                url: url.to_string(),
                message: format!("unexpected status {}", r.status().as_u16()),
            });
        }

        r.text()
            .await
            .map_err(|e| ProbeError::from_reqwest(url, &e))
    }
}

/// `name=value&name=value` with form encoding.
pub fn encode_form(params: &[ParamSlot]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|p| (p.name.as_str(), p.value.as_str())))
        .finish()
}

fn truncate_for_log(url: &str) -> String {
    const MAX: usize = 160;
    if url.len() <= MAX {
        return url.to_string();
    }
    let mut end = MAX;
    while !url.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &url[..end], url.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(target: Target) -> HttpProbeClient {
        HttpProbeClient::new(Arc::new(target)).unwrap()
    }

    #[test]
    fn test_query_placement_appends_params() {
        let target = Target::new("http://example.com/search?q=x").unwrap();
        let client = client_for(target);
        let (url, _) = client.build_request(&[ParamSlot::new("debug", "1"), ParamSlot::new("a b", "1")]);
        assert_eq!(url, "http://example.com/search?q=x&debug=1&a+b=1");
    }

    #[test]
    fn test_baseline_keeps_url_untouched() {
        let target = Target::new("http://example.com/page").unwrap();
        let client = client_for(target);
        let (url, _) = client.build_request(&[]);
        assert_eq!(url, "http://example.com/page");
    }

    #[test]
    fn test_body_placement_leaves_url_alone() {
        let target = Target::new("http://example.com/api")
            .unwrap()
            .with_method("PUT")
            .unwrap()
            .with_content_type("application/json");
        let client = client_for(target);
        let (url, builder) = client.build_request(&[ParamSlot::new("id", "1")]);
        assert_eq!(url, "http://example.com/api");
        let req = builder.build().unwrap();
        let body = req.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, b"id=1");
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_encode_form() {
        let params = vec![ParamSlot::new("a", "1"), ParamSlot::new("b&c", "x y")];
        assert_eq!(encode_form(&params), "a=1&b%26c=x+y");
        assert_eq!(encode_form(&[]), "");
    }

    #[test]
    fn test_truncate_for_log() {
        let long = format!("http://example.com/?{}", "a".repeat(500));
        let short = truncate_for_log(&long);
        assert!(short.len() < 200);
        assert!(short.ends_with(&format!("({} bytes)", long.len())));
    }
}
