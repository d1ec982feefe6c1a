use std::time::Duration;

use clap::Args;
use govsync_client::{ClientConfig, RetryPolicy};

/// How to reach and authenticate against a tenant.
#[derive(Args, Debug, Clone)]
pub struct ConnectionOptions {
    /// Base URL of the tenant API
    #[arg(long, env = "GOVSYNC_BASE_URL")]
    pub base_url: String,

    /// OAuth2 client ID
    #[arg(long, env = "GOVSYNC_CLIENT_ID")]
    pub client_id: String,

    /// OAuth2 client secret
    #[arg(long, env = "GOVSYNC_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Retries after a transient failure before giving up
    #[arg(long, default_value_t = RetryPolicy::default().max_retries)]
    pub max_retries: u32,

    /// Timeout of a single HTTP attempt, in seconds
    #[arg(long, default_value_t = ClientConfig::DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub request_timeout: u64,
}

impl ConnectionOptions {
    pub fn to_config(&self) -> ClientConfig {
        ClientConfig::new(&self.base_url, &self.client_id, &self.client_secret)
            .with_retry_policy(RetryPolicy::default().with_max_retries(self.max_retries))
            .with_request_timeout(Duration::from_secs(self.request_timeout))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser, Debug)]
    #[command(no_binary_name = true)]
    struct Wrapper {
        #[command(flatten)]
        connection: ConnectionOptions,
    }

    #[test]
    fn builds_client_config() {
        let w = Wrapper::try_parse_from([
            "--base-url",
            "https://tenant.example.com/",
            "--client-id",
            "id",
            "--client-secret",
            "secret",
            "--max-retries",
            "2",
        ])
        .unwrap();
        let config = w.connection.to_config();
        assert_eq!(config.base_url, "https://tenant.example.com");
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.max_backoff, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.token_safety_margin, Duration::from_secs(300));
    }
}
