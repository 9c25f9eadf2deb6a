//! Runtime API configuration.
//!
//! The endpoint address comes from the process environment
//! (`AWS_LAMBDA_RUNTIME_API`, a `host:port` pair). Without it the process
//! cannot do anything useful, so [`RuntimeConfig::from_env`] fails and the
//! binary exits.
//!
//! Response-client timeouts default to values that make result delivery fail
//! fast; each can be overridden through a `RUNLOOP_*` variable holding a
//! positive number of milliseconds.

use std::env;
use std::fmt;
use std::time::Duration;

use runloop_types::protocol::{INVOCATION_SEGMENT, NEXT_SEGMENT};
use thiserror::Error;
use url::Url;

pub const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";
pub const RESPONSE_CONNECT_TIMEOUT_ENV: &str = "RUNLOOP_RESPONSE_CONNECT_TIMEOUT_MS";
pub const RESPONSE_READ_TIMEOUT_ENV: &str = "RUNLOOP_RESPONSE_READ_TIMEOUT_MS";
pub const RESPONSE_TIMEOUT_ENV: &str = "RUNLOOP_RESPONSE_TIMEOUT_MS";

/// Path prefix of the protocol version this client speaks.
pub const API_VERSION_PATH: &str = "2018-06-01/runtime";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AWS_LAMBDA_RUNTIME_API not set")]
    MissingEndpoint,
    #[error("invalid runtime API endpoint {value:?}: {reason}")]
    InvalidEndpoint { value: String, reason: String },
    #[error("{var} must be a positive number of milliseconds, got {value:?}")]
    InvalidTimeout { var: &'static str, value: String },
}

/// Base URL of the runtime API, e.g. `http://127.0.0.1:9001/2018-06-01/runtime`.
///
/// Only hierarchical `http`/`https` URLs are accepted, so appending path
/// segments always succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Build the versioned base URL from a `host:port` value.
    pub fn from_host(host: &str) -> Result<Self, ConfigError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ConfigError::InvalidEndpoint {
                value: host.to_string(),
                reason: "host is empty".to_string(),
            });
        }
        Self::parse(&format!("http://{host}/{API_VERSION_PATH}"))
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            value: raw.to_string(),
            reason,
        };
        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", url.scheme())));
        }
        if url.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path".to_string()));
        }
        Ok(Self(url))
    }

    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Append percent-encoded path segments to the base URL.
    #[must_use]
    pub fn join<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.0.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `{base}/invocation/next`
    #[must_use]
    pub fn next_invocation(&self) -> Url {
        self.join([INVOCATION_SEGMENT, NEXT_SEGMENT])
    }

    /// `{base}/invocation/{request_id}/{suffix}`
    #[must_use]
    pub fn invocation(&self, request_id: &str, suffix: &str) -> Url {
        self.join([INVOCATION_SEGMENT, request_id, suffix])
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Bounds for the client that delivers results.
///
/// The fetch client has no counterpart: waiting for the next invocation may
/// legitimately block forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseTimeouts {
    pub connect: Duration,
    /// Maximum gap between reads, which bounds the wait for response headers.
    pub read: Duration,
    pub total: Duration,
    pub pool_idle: Duration,
}

impl Default for ResponseTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
            total: DEFAULT_TOTAL_TIMEOUT,
            pool_idle: DEFAULT_POOL_IDLE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub endpoint: Endpoint,
    pub response: ResponseTimeouts,
}

impl RuntimeConfig {
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            response: ResponseTimeouts::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(RUNTIME_API_ENV).ok_or(ConfigError::MissingEndpoint)?;
        let endpoint = Endpoint::from_host(&host)?;

        let mut response = ResponseTimeouts::default();
        if let Some(connect) = timeout_override(&lookup, RESPONSE_CONNECT_TIMEOUT_ENV)? {
            response.connect = connect;
        }
        if let Some(read) = timeout_override(&lookup, RESPONSE_READ_TIMEOUT_ENV)? {
            response.read = read;
        }
        if let Some(total) = timeout_override(&lookup, RESPONSE_TIMEOUT_ENV)? {
            response.total = total;
        }

        tracing::debug!(%endpoint, ?response, "Resolved runtime API configuration");
        Ok(Self { endpoint, response })
    }

    #[must_use]
    pub fn with_response_timeouts(mut self, response: ResponseTimeouts) -> Self {
        self.response = response;
        self
    }
}

fn timeout_override<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(millis) if millis > 0 => Ok(Some(Duration::from_millis(millis))),
        _ => Err(ConfigError::InvalidTimeout { var, value: raw }),
    }
}
