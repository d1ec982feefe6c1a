//! Authenticated access to the identity-governance platform API.
//!
//! A [`Client`] obtains OAuth2 client-credential bearer tokens, caches them
//! until shortly before they expire, and retries transient failures with
//! exponential backoff. Every call takes a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) that aborts
//! waits and in-flight requests.

pub mod backend;
mod client;
pub mod config;
mod credential;
pub mod error;

pub use backend::{Body, HttpBackend, RawRequest, RawResponse, ReqwestBackend};
pub use client::Client;
pub use config::{ClientConfig, RetryPolicy};
pub use error::{ClientError, FailureCause};
pub use reqwest::{Method, StatusCode};
pub use tokio_util::sync::CancellationToken;
