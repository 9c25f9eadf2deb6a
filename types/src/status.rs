use thiserror::Error;

/// A runtime API response outside the 2xx range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("runtime API returned server error: HTTP {0}")]
    Server(u16),
    #[error("runtime API returned client error: HTTP {0}")]
    Client(u16),
    #[error("runtime API returned unexpected HTTP {0}")]
    Unexpected(u16),
}

impl StatusError {
    /// Classify a status code. `None` for 2xx.
    #[must_use]
    pub fn classify(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            500.. => Some(Self::Server(status)),
            400..=499 => Some(Self::Client(status)),
            _ => Some(Self::Unexpected(status)),
        }
    }

    /// Classify a response that must be exactly `200 OK`.
    ///
    /// Any other 2xx is reported as unexpected; the remaining ranges follow
    /// [`StatusError::classify`].
    #[must_use]
    pub fn expect_ok(status: u16) -> Option<Self> {
        match status {
            200 => None,
            200..=299 => Some(Self::Unexpected(status)),
            _ => Self::classify(status),
        }
    }

    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::Server(status) | Self::Client(status) | Self::Unexpected(status) => status,
        }
    }
}
