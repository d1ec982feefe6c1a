use std::sync::Arc;

use anyhow::Result;
use json_patch::Patch;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER},
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use crate::{
    backend::{
        Body, HttpBackend, RawRequest, RawResponse, ReqwestBackend, JSON_PATCH_CONTENT_TYPE,
    },
    config::{parse_retry_after, ClientConfig, RetryPolicy},
    credential::{bearer_header, TokenCache},
    error::{ClientError, FailureCause},
};

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";

/// Authenticated access to the platform API.
///
/// A `Client` is meant to be shared, e.g. behind an `Arc`; all methods take
/// `&self` and the bearer token is cached across calls.
pub struct Client {
    config: ClientConfig,
    backend: Arc<dyn HttpBackend>,
    tokens: TokenCache,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let backend = ReqwestBackend::new(config.request_timeout)?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    pub fn with_backend(config: ClientConfig, backend: Arc<dyn HttpBackend>) -> Self {
        Client {
            config,
            backend,
            tokens: TokenCache::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A currently valid bearer token.
    pub async fn credential(&self, cancel: &CancellationToken) -> Result<String, ClientError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            token = self.tokens.token(&self.config, self.backend.as_ref()) => token,
        }
    }

    /// Verify the client credentials by obtaining a token.
    pub async fn authenticate(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        self.credential(cancel).await.map(|_| ())
    }

    /// Send an authenticated request, retrying transient failures.
    ///
    /// Network errors and 5xx, 429 and 408 responses are retried up to
    /// `max_retries` times. Any other status outside 2xx and 3xx is
    /// returned as [`ClientError::RemoteRejection`] without retrying.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        method: Method,
        path: &str,
        body: Body,
    ) -> Result<RawResponse, ClientError> {
        let span = tracing::debug_span!("execute", %method, path);
        self.execute_inner(cancel, method, path, body)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        cancel: &CancellationToken,
        method: Method,
        path: &str,
        body: Body,
    ) -> Result<RawResponse, ClientError> {
        let policy = &self.config.retry;
        let mut retry = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            let token = self.credential(cancel).await?;
            let request = self.request(method.clone(), path, &body, &token)?;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                outcome = self.backend.send(request) => outcome,
            };

            let (cause, retry_after) = match outcome {
                Ok(response) => {
                    log_rate_limit(&response);
                    let status = response.status;
                    if status.is_success() || status.is_redirection() {
                        debug!(%status, "Request succeeded");
                        return Ok(response);
                    }
                    if !RetryPolicy::is_retryable_status(status) {
                        return Err(ClientError::RemoteRejection {
                            method,
                            path: path.to_string(),
                            status,
                            body: response.text(),
                            headers: response.headers,
                        });
                    }
                    let retry_after = response
                        .header(RETRY_AFTER.as_str())
                        .and_then(parse_retry_after);
                    (
                        FailureCause::Status {
                            status,
                            body: response.text(),
                        },
                        retry_after,
                    )
                }
                Err(e) => (FailureCause::Network(format!("{:#}", e)), None),
            };

            if retry >= policy.max_retries {
                return Err(ClientError::Transport {
                    method,
                    path: path.to_string(),
                    attempts: retry + 1,
                    cause,
                });
            }
            let wait = policy.backoff(retry, retry_after);
            warn!(
                attempt = retry + 1,
                wait_ms = wait.as_millis() as u64,
                "Transient failure, retrying: {}",
                cause
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
            retry += 1;
        }
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        body: &Body,
        token: &str,
    ) -> Result<RawRequest, ClientError> {
        let authorization = bearer_header(token).ok_or_else(|| ClientError::Authentication {
            status: None,
            message: "access token is not a valid header value".to_string(),
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, authorization);
        let content_type = match body {
            Body::JsonPatch(_) => JSON_PATCH_CONTENT_TYPE,
            Body::Form(_) => "application/x-www-form-urlencoded",
            Body::Json(_) | Body::Empty => "application/json",
        };
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Ok(RawRequest {
            method,
            url: self.config.url(path),
            headers,
            body: body.clone(),
        })
    }

    /// Fetch and decode the object at `path`.
    pub async fn get_object<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<T, ClientError> {
        let response = self.execute(cancel, Method::GET, path, Body::Empty).await?;
        decode(Method::GET, path, &response)
    }

    /// Create an object under the collection at `path`, returning the
    /// object as stored by the server.
    pub async fn create_object<T: Serialize, R: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        object: &T,
    ) -> Result<R, ClientError> {
        let value = serde_json::to_value(object).map_err(|e| ClientError::Decode {
            method: Method::POST,
            path: path.to_string(),
            message: format!("could not serialize request body: {}", e),
        })?;
        let response = self
            .execute(cancel, Method::POST, path, Body::Json(value))
            .await?;
        decode(Method::POST, path, &response)
    }

    /// Apply `patch` to the object at `path`.
    ///
    /// An empty patch sends nothing and yields `None`.
    pub async fn patch_object<R: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        path: &str,
        patch: &Patch,
    ) -> Result<Option<R>, ClientError> {
        if patch.0.is_empty() {
            debug!(path, "Patch is empty, nothing to send");
            return Ok(None);
        }
        let response = self
            .execute(cancel, Method::PATCH, path, Body::JsonPatch(patch.clone()))
            .await?;
        decode(Method::PATCH, path, &response).map(Some)
    }

    pub async fn delete_object(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<(), ClientError> {
        self.execute(cancel, Method::DELETE, path, Body::Empty).await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(
    method: Method,
    path: &str,
    response: &RawResponse,
) -> Result<T, ClientError> {
    response.json().map_err(|e| ClientError::Decode {
        method,
        path: path.to_string(),
        message: e.to_string(),
    })
}

fn log_rate_limit(response: &RawResponse) {
    let remaining = response.header(RATE_LIMIT_REMAINING);
    let limit = response.header(RATE_LIMIT_LIMIT);
    match (remaining, limit) {
        (Some(remaining), Some(limit)) => debug!(remaining, limit, "Rate limit headroom"),
        (Some(remaining), None) => debug!(remaining, "Rate limit headroom"),
        _ => {}
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use json_patch::{jsonptr::PointerBuf, PatchOperation, ReplaceOperation};
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use tokio::time::Instant;

    use super::*;
    use crate::backend::testing::{FakeBackend, Reply};

    fn client(backend: Arc<FakeBackend>) -> Client {
        let config = ClientConfig::new("https://tenant.example.com", "client", "secret");
        Client::with_backend(config, backend)
    }

    fn assert_elapsed(start: Instant, seconds: u64) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_secs(seconds) && elapsed < Duration::from_secs(seconds + 1),
            "{:?}",
            elapsed
        );
    }

    async fn get(client: &Client) -> Result<RawResponse, ClientError> {
        client
            .execute(&CancellationToken::new(), Method::GET, "v3/roles/r1", Body::Empty)
            .await
    }

    #[tokio::test]
    async fn success_carries_bearer_token() {
        let backend = Arc::new(FakeBackend::new().reply(Reply::Json(200, json!({"id": "r1"}))));
        let client = client(backend.clone());

        let response = get(&client).await.unwrap();
        assert_eq!(response.json::<Value>().unwrap(), json!({"id": "r1"}));

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://tenant.example.com/v3/roles/r1");
        assert_eq!(requests[0].headers[AUTHORIZATION], "Bearer token-1");
        assert_eq!(requests[0].headers[ACCEPT], "application/json");
        assert_eq!(requests[0].headers[CONTENT_TYPE], "application/json");
        assert_eq!(backend.token_calls(), 1);
    }

    #[tokio::test]
    async fn token_is_reused_across_calls() {
        let backend = Arc::new(FakeBackend::new());
        let client = client(backend.clone());
        for _ in 0..5 {
            get(&client).await.unwrap();
        }
        assert_eq!(backend.api_calls(), 5);
        assert_eq!(backend.token_calls(), 1);
    }

    #[tokio::test]
    async fn redirection_is_not_an_error() {
        let backend = Arc::new(FakeBackend::new().reply(Reply::Status(304)));
        let client = client(backend.clone());
        let response = get(&client).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_MODIFIED);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_four_times_then_succeeds() {
        let mut backend = FakeBackend::new();
        for _ in 0..4 {
            backend = backend.reply(Reply::Status(429));
        }
        let backend = Arc::new(backend.reply(Reply::Json(200, json!({"ok": true}))));
        let client = client(backend.clone());

        let start = Instant::now();
        let response = get(&client).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(backend.api_calls(), 5);
        // 1 + 2 + 4 + 8 seconds of backoff.
        assert_elapsed(start, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_is_exhausted() {
        let backend = Arc::new(FakeBackend::new().always(Reply::Status(503)));
        let client = client(backend.clone());

        let start = Instant::now();
        let err = get(&client).await.unwrap_err();
        match &err {
            ClientError::Transport {
                attempts,
                cause: FailureCause::Status { status, .. },
                ..
            } => {
                assert_eq!(*attempts, 6);
                assert_eq!(*status, StatusCode::SERVICE_UNAVAILABLE);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.is_retryable());
        assert_eq!(backend.api_calls(), 6);
        // 1 + 2 + 4 + 8 + 16 seconds of backoff.
        assert_elapsed(start, 31);
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_are_retried() {
        let backend = Arc::new(
            FakeBackend::new()
                .reply(Reply::NetworkError)
                .reply(Reply::Status(408))
                .reply(Reply::Json(200, json!({}))),
        );
        let client = client(backend.clone());
        get(&client).await.unwrap();
        assert_eq!(backend.api_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn network_error_on_last_attempt_is_reported() {
        let backend = Arc::new(FakeBackend::new().always(Reply::NetworkError));
        let config = ClientConfig::new("https://tenant.example.com", "client", "secret")
            .with_retry_policy(RetryPolicy::default().with_max_retries(2));
        let client = Client::with_backend(config, backend.clone());

        let err = get(&client).await.unwrap_err();
        match err {
            ClientError::Transport {
                attempts,
                cause: FailureCause::Network(message),
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(message.contains("connection reset"), "{}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_header_sets_the_wait() {
        let backend = Arc::new(
            FakeBackend::new()
                .reply(Reply::StatusWithHeader(429, "retry-after", "7"))
                .reply(Reply::Json(200, json!({}))),
        );
        let client = client(backend.clone());

        let start = Instant::now();
        get(&client).await.unwrap();
        assert_elapsed(start, 7);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let backend = Arc::new(
            FakeBackend::new().always(Reply::Json(
                400,
                json!({"detailCode": "400.1 Bad request content"}),
            )),
        );
        let client = client(backend.clone());

        let err = get(&client).await.unwrap_err();
        match &err {
            ClientError::RemoteRejection {
                status, body, path, ..
            } => {
                assert_eq!(*status, StatusCode::BAD_REQUEST);
                assert!(body.contains("400.1"));
                assert_eq!(path, "v3/roles/r1");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_retryable());
        assert_eq!(backend.api_calls(), 1);
    }

    #[tokio::test]
    async fn authentication_failure_is_not_retried() {
        let backend = Arc::new(FakeBackend::new().with_token_status(400));
        let client = client(backend.clone());

        let err = get(&client).await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication { .. }), "{:?}", err);
        assert_eq!(backend.token_calls(), 1);
        assert_eq!(backend.api_calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let backend = Arc::new(FakeBackend::new());
        let client = client(backend.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .execute(&cancel, Method::GET, "v3/roles", Body::Empty)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(backend.token_calls(), 0);
        assert_eq!(backend.api_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_during_backoff() {
        let backend = Arc::new(FakeBackend::new().always(Reply::Status(503)));
        let client = Arc::new(client(backend.clone()));
        let cancel = CancellationToken::new();

        let task = {
            let (client, cancel) = (client.clone(), cancel.clone());
            tokio::spawn(async move {
                client
                    .execute(&cancel, Method::GET, "v3/roles", Body::Empty)
                    .await
            })
        };
        while backend.api_calls() == 0 {
            tokio::task::yield_now().await;
        }
        let start = Instant::now();
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(backend.api_calls(), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_issuance_releases_the_credential_lock() {
        let backend = Arc::new(FakeBackend::new().with_token_delay(Duration::from_secs(10)));
        let client = Arc::new(client(backend.clone()));
        let cancel = CancellationToken::new();

        let task = {
            let (client, cancel) = (client.clone(), cancel.clone());
            tokio::spawn(async move { client.credential(&cancel).await })
        };
        while backend.token_calls() == 0 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        assert!(matches!(task.await.unwrap(), Err(ClientError::Cancelled)));

        let token = client.credential(&CancellationToken::new()).await.unwrap();
        assert_eq!(token, "token-2");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_during_send() {
        let backend = Arc::new(FakeBackend::new().with_api_delay(Duration::from_secs(60)));
        let client = Arc::new(client(backend.clone()));
        let cancel = CancellationToken::new();

        let task = {
            let (client, cancel) = (client.clone(), cancel.clone());
            tokio::spawn(async move {
                client
                    .execute(&cancel, Method::GET, "v3/roles", Body::Empty)
                    .await
            })
        };
        while backend.api_calls() == 0 {
            tokio::task::yield_now().await;
        }
        let start = Instant::now();
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Cancelled), "{:?}", err);
        assert_eq!(backend.api_calls(), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn token_unusable_as_header_is_an_authentication_error() {
        let backend = Arc::new(FakeBackend::new().with_access_token("abc\ndef"));
        let client = client(backend.clone());

        let err = get(&client).await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication { .. }), "{:?}", err);
        assert_eq!(backend.api_calls(), 0);
    }

    #[tokio::test]
    async fn rate_limit_headers_do_not_change_the_outcome() {
        let backend = Arc::new(
            FakeBackend::new()
                .reply(Reply::StatusWithHeader(200, "x-ratelimit-remaining", "3"))
                .reply(Reply::StatusWithHeader(200, "x-ratelimit-limit", "100")),
        );
        let client = client(backend.clone());
        assert_eq!(get(&client).await.unwrap().status, StatusCode::OK);
        assert_eq!(get(&client).await.unwrap().status, StatusCode::OK);
        assert_eq!(backend.api_calls(), 2);
    }

    #[tokio::test]
    async fn empty_patch_sends_nothing() {
        let backend = Arc::new(FakeBackend::new());
        let client = client(backend.clone());
        let updated: Option<Value> = client
            .patch_object(&CancellationToken::new(), "v3/roles/r1", &Patch(vec![]))
            .await
            .unwrap();
        assert!(updated.is_none());
        assert_eq!(backend.api_calls(), 0);
        assert_eq!(backend.token_calls(), 0);
    }

    #[tokio::test]
    async fn patch_uses_json_patch_content_type() {
        let backend = Arc::new(
            FakeBackend::new().reply(Reply::Json(200, json!({"id": "r1", "name": "Auditors"}))),
        );
        let client = client(backend.clone());
        let patch = Patch(vec![PatchOperation::Replace(ReplaceOperation {
            path: PointerBuf::from_tokens(["name"]),
            value: json!("Auditors"),
        })]);

        let updated: Option<Value> = client
            .patch_object(&CancellationToken::new(), "v3/roles/r1", &patch)
            .await
            .unwrap();
        assert_eq!(updated.unwrap()["name"], "Auditors");

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0].method, Method::PATCH);
        assert_eq!(requests[0].headers[CONTENT_TYPE], JSON_PATCH_CONTENT_TYPE);
        match &requests[0].body {
            Body::JsonPatch(sent) => assert_eq!(sent, &patch),
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn object_helpers_decode_responses() {
        let backend = Arc::new(
            FakeBackend::new()
                .reply(Reply::Json(201, json!({"id": "ap-1", "name": "Developers"})))
                .reply(Reply::Json(200, json!("not an object")))
                .reply(Reply::Status(204)),
        );
        let client = client(backend.clone());
        let cancel = CancellationToken::new();

        let created: Value = client
            .create_object(&cancel, "v3/access-profiles", &json!({"name": "Developers"}))
            .await
            .unwrap();
        assert_eq!(created["id"], "ap-1");

        #[derive(Debug, serde::Deserialize)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }
        let err = client
            .get_object::<Named>(&cancel, "v3/access-profiles/ap-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }), "{:?}", err);

        client
            .delete_object(&cancel, "v3/access-profiles/ap-1")
            .await
            .unwrap();

        let requests = backend.requests.lock().unwrap();
        let methods: Vec<_> = requests.iter().map(|r| r.method.clone()).collect();
        assert_eq!(methods, vec![Method::POST, Method::GET, Method::DELETE]);
        assert_eq!(requests[0].headers[CONTENT_TYPE], "application/json");
    }
}
