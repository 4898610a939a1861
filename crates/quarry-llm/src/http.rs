//! One place to build the `reqwest` client used by the HTTP back-ends.

use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
// Local models can take a while to answer a long grounded prompt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Client with Quarry's timeouts and user agent.
///
/// Falls back to `reqwest`'s defaults if the builder is rejected by the TLS backend.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("quarry/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("falling back to default http client: {e}");
            reqwest::Client::new()
        })
}
