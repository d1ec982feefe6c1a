//! The seam between the client and the network.
//!
//! [`Client`](crate::Client) decides what to send and how to react to the
//! outcome; an [`HttpBackend`] only performs one exchange. Tests substitute
//! a scripted backend.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use json_patch::Patch;
use reqwest::{header::HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";

/// Request payload.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    /// Sent with the `application/json-patch+json` content type.
    JsonPatch(Patch),
    /// Sent as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Body,
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Performs a single HTTP exchange. An `Err` means no response was received.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn send(&self, request: RawRequest) -> Result<RawResponse>;
}

pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Could not create HTTP client")?;
        Ok(ReqwestBackend { client })
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn send(&self, request: RawRequest) -> Result<RawResponse> {
        let RawRequest {
            method,
            url,
            headers,
            body,
        } = request;
        let mut builder = self
            .client
            .request(method.clone(), url.as_str())
            .headers(headers);
        builder = match body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::JsonPatch(patch) => builder.body(
                serde_json::to_vec(&patch).context("Could not serialize JSON patch")?,
            ),
            Body::Form(pairs) => builder.form(&pairs),
        };
        let response = builder
            .send()
            .await
            .with_context(|| format!("{} {}", method, url))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Reading response body of {} {}", method, url))?
            .to_vec();
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
