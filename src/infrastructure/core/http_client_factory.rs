use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// HTTP client with retry middleware for feed and discovery fetches.
    /// Exponential backoff, max 3 retries, 30s request timeout.
    pub fn create_client() -> ClientWithMiddleware {
        Self::create_client_with_timeout(Duration::from_secs(30))
    }

    /// Same client with a caller-chosen timeout. Discovery calls use the
    /// shorter 15s budget so a slow venue cannot stall a decision cycle.
    pub fn create_client_with_timeout(timeout: Duration) -> ClientWithMiddleware {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build()
    }
}
