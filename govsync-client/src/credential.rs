//! Bearer token cache.
//!
//! The token is shared by every caller of a [`Client`](crate::Client).
//! Readers take the shared lock and return the cached token while it is
//! valid. A reader that finds it stale takes the exclusive lock, checks
//! again, and only then calls the token endpoint, so concurrent callers
//! racing past expiry cause exactly one issuance.

use std::time::Duration;

use reqwest::{header::HeaderValue, Method};
use serde::Deserialize;
use tokio::{sync::RwLock, time::Instant};
use tracing::{debug, info};

use crate::{
    backend::{Body, HttpBackend, RawRequest},
    config::ClientConfig,
    error::ClientError,
};

#[derive(Debug, Clone)]
struct Credential {
    access_token: String,
    /// Issuance time plus lifetime minus the safety margin.
    refresh_at: Instant,
}

impl Credential {
    fn is_valid(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

pub(crate) struct TokenCache {
    current: RwLock<Option<Credential>>,
}

impl TokenCache {
    pub(crate) fn new() -> Self {
        TokenCache {
            current: RwLock::new(None),
        }
    }

    /// A valid bearer token, issuing a new one if needed.
    ///
    /// Dropping the returned future releases any lock it holds.
    pub(crate) async fn token(
        &self,
        config: &ClientConfig,
        backend: &dyn HttpBackend,
    ) -> Result<String, ClientError> {
        {
            let current = self.current.read().await;
            if let Some(credential) = current.as_ref() {
                if credential.is_valid(Instant::now()) {
                    return Ok(credential.access_token.clone());
                }
            }
        }

        let mut current = self.current.write().await;
        if let Some(credential) = current.as_ref() {
            if credential.is_valid(Instant::now()) {
                return Ok(credential.access_token.clone());
            }
        }
        let credential = issue(config, backend).await?;
        let token = credential.access_token.clone();
        *current = Some(credential);
        Ok(token)
    }
}

/// How long before expiry a token of `lifetime` is replaced. A lifetime
/// that does not exceed the configured margin is refreshed at its midpoint.
pub(crate) fn effective_margin(lifetime: Duration, margin: Duration) -> Duration {
    if lifetime > margin {
        margin
    } else {
        lifetime / 2
    }
}

async fn issue(
    config: &ClientConfig,
    backend: &dyn HttpBackend,
) -> Result<Credential, ClientError> {
    info!("Requesting access token");
    // Expiry counts from before the request, not from when the reply arrived.
    let requested_at = Instant::now();
    let request = RawRequest {
        method: Method::POST,
        url: config.token_url(),
        headers: Default::default(),
        body: Body::Form(vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), config.client_id.clone()),
            ("client_secret".to_string(), config.client_secret.clone()),
        ]),
    };
    let response = backend
        .send(request)
        .await
        .map_err(|e| ClientError::Authentication {
            status: None,
            message: format!("{:#}", e),
        })?;
    if !response.status.is_success() {
        return Err(ClientError::Authentication {
            status: Some(response.status),
            message: format!(
                "token endpoint returned {}: {}",
                response.status,
                response.text()
            ),
        });
    }
    let token: TokenResponse = response.json().map_err(|e| ClientError::Authentication {
        status: Some(response.status),
        message: format!("malformed token response: {}", e),
    })?;

    if bearer_header(&token.access_token).is_none() {
        return Err(ClientError::Authentication {
            status: Some(response.status),
            message: "access token is not a valid header value".to_string(),
        });
    }

    let lifetime = Duration::from_secs(token.expires_in);
    let margin = effective_margin(lifetime, config.token_safety_margin);
    let refresh_at = requested_at
        .checked_add(lifetime - margin)
        .ok_or_else(|| ClientError::Authentication {
            status: Some(response.status),
            message: format!("token lifetime out of range: {}s", token.expires_in),
        })?;
    debug!(
        lifetime = lifetime.as_secs(),
        margin = margin.as_secs(),
        "Access token issued"
    );
    Ok(Credential {
        access_token: token.access_token,
        refresh_at,
    })
}

/// The `Authorization` value for `token`, if it can be sent in a header.
pub(crate) fn bearer_header(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).ok()?;
    value.set_sensitive(true);
    Some(value)
}
