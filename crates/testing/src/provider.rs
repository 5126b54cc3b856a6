use crate::reporter::Reporter;
use alloy::{
    providers::ProviderBuilder,
    rpc::client::ClientBuilder,
    transports::{http::Http, layers::RetryBackoffLayer},
};
use std::time::Duration;
use testkit_wallet::RpcProvider;
use url::Url;

/// Request timeout of the rollup-layer client. Some calls wait for batch finalization.
pub const L2_REQUEST_TIMEOUT: Duration = Duration::from_secs(1200);

/// Poll interval of both clients on a local deployment.
pub const LOCALHOST_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll interval of the rollup-layer client on shared deployments.
pub const REMOTE_L2_POLL_INTERVAL: Duration = Duration::from_millis(5000);

const MAX_RATE_LIMIT_RETRIES: u32 = 10;
const INITIAL_BACKOFF_MS: u64 = 500;
const COMPUTE_UNITS_PER_SECOND: u64 = 330;

/// Helper struct to configure a JSON-RPC client over HTTP
#[derive(Clone, Debug)]
#[must_use = "call `build` to construct the client"]
pub struct ProviderConfig {
    url: Url,
    timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    retries: bool,
}

impl ProviderConfig {
    /// Plain client for `url` with transport defaults.
    pub fn new(url: Url) -> Self {
        Self { url, timeout: None, poll_interval: None, retries: false }
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets how often pending transactions and filters are polled.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = Some(poll_interval);
        self
    }

    /// Retries rate limited and transient failures with exponential backoff.
    pub fn with_retries(mut self) -> Self {
        self.retries = true;
        self
    }

    /// Endpoint of the client.
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Configured poll interval, `None` for the transport default.
    pub const fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    /// Builds the client. No request is sent.
    pub fn build(self) -> Result<RpcProvider, reqwest::Error> {
        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let transport = Http::with_client(http.build()?, self.url);
        let is_local = transport.guess_local();

        let client = if self.retries {
            ClientBuilder::default()
                .layer(RetryBackoffLayer::new(
                    MAX_RATE_LIMIT_RETRIES,
                    INITIAL_BACKOFF_MS,
                    COMPUTE_UNITS_PER_SECOND,
                ))
                .transport(transport, is_local)
                .boxed()
        } else {
            ClientBuilder::default().transport(transport, is_local).boxed()
        };
        let client = match self.poll_interval {
            Some(poll_interval) => client.with_poll_interval(poll_interval),
            None => client,
        };

        Ok(ProviderBuilder::new().on_client(client))
    }
}

/// Base-layer client configuration. Only a local deployment overrides the poll interval.
pub fn l1_config(url: Url, localhost: bool) -> ProviderConfig {
    let config = ProviderConfig::new(url);
    if localhost {
        config.with_poll_interval(LOCALHOST_POLL_INTERVAL)
    } else {
        config
    }
}

/// Rollup-layer client configuration: long timeout, retries, and a poll interval that depends
/// on whether the deployment is shared.
pub fn l2_config(url: Url, localhost: bool) -> ProviderConfig {
    let poll_interval = if localhost { LOCALHOST_POLL_INTERVAL } else { REMOTE_L2_POLL_INTERVAL };
    ProviderConfig::new(url)
        .with_timeout(L2_REQUEST_TIMEOUT)
        .with_retries()
        .with_poll_interval(poll_interval)
}

/// Builds the rollup-layer client, reporting its configuration.
pub fn l2_provider(
    config: ProviderConfig,
    reporter: &Reporter,
) -> Result<RpcProvider, reqwest::Error> {
    reporter.debug(&format!(
        "connecting to L2 at {} (timeout {:?}, poll interval {:?})",
        config.url, config.timeout, config.poll_interval
    ));
    config.build()
}
