//! HTTP clients for the two halves of the protocol.
//!
//! | Client | Used for | Timeouts |
//! |--------|----------|----------|
//! | wait | `GET /invocation/next` | none: the endpoint may park the caller indefinitely |
//! | response | `POST .../response`, `POST .../error` | connect, read and total bounds |
//!
//! The default `reqwest` builder carries no overall timeout, but keep-alive and
//! pool settings are pinned explicitly so the two clients never share state.

use std::time::Duration;

use runloop_config::ResponseTimeouts;

const TCP_KEEPALIVE_SECS: u64 = 60;

/// Results go to a single host, one at a time.
const POOL_MAX_IDLE_PER_HOST: usize = 1;

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
}

/// Client for the long-poll fetch. Never times out on its own.
pub fn wait_client() -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder().pool_idle_timeout(None).build()
}

/// Client for result delivery. Fails fast rather than hanging the process.
pub fn response_client(timeouts: &ResponseTimeouts) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder()
        .connect_timeout(timeouts.connect)
        .read_timeout(timeouts.read)
        .timeout(timeouts.total)
        .pool_idle_timeout(Some(timeouts.pool_idle))
        .build()
}
