//! Absolute invocation deadlines.
//!
//! The endpoint sends the deadline as integer milliseconds since the Unix
//! epoch. [`Deadline`] keeps it as a [`SystemTime`] so it can be compared
//! against the wall clock and turned into a remaining [`Duration`].

use std::fmt;
use std::num::ParseIntError;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeadlineError {
    #[error("deadline header is missing")]
    Missing,
    #[error("deadline {value:?} is not an integer: {source}")]
    Invalid {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("deadline {0}ms is outside the representable time range")]
    OutOfRange(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(SystemTime);

impl Deadline {
    /// Build a deadline from milliseconds relative to the Unix epoch.
    ///
    /// Negative values land before the epoch, matching a signed parse of the
    /// header. Returns `None` only when the platform cannot represent the time.
    #[must_use]
    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        let offset = Duration::from_millis(millis.unsigned_abs());
        let time = if millis >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        };
        time.map(Self)
    }

    /// Parse the raw header value. `None` means the header was absent.
    pub fn parse_header(raw: Option<&str>) -> Result<Self, DeadlineError> {
        let raw = raw.ok_or(DeadlineError::Missing)?;
        let millis = raw
            .trim()
            .parse::<i64>()
            .map_err(|source| DeadlineError::Invalid {
                value: raw.to_string(),
                source,
            })?;
        Self::from_epoch_millis(millis).ok_or(DeadlineError::OutOfRange(millis))
    }

    /// A deadline that has already passed.
    #[must_use]
    pub const fn expired() -> Self {
        Self(UNIX_EPOCH)
    }

    #[must_use]
    pub fn at(time: SystemTime) -> Self {
        Self(time)
    }

    #[must_use]
    pub const fn as_system_time(self) -> SystemTime {
        self.0
    }

    /// Milliseconds since the Unix epoch, negative before it.
    #[must_use]
    pub fn epoch_millis(self) -> i64 {
        match self.0.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_millis() as i64,
            Err(before) => -(before.duration().as_millis() as i64),
        }
    }

    /// Time left before the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(self, now: SystemTime) -> Duration {
        self.0.duration_since(now).unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn has_passed(self, now: SystemTime) -> bool {
        now >= self.0
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.epoch_millis())
    }
}
