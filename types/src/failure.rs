use std::any::type_name;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Body of a failure report sent to the `/error` resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    #[serde(rename = "errorMessage")]
    pub message: String,
    #[serde(rename = "errorType")]
    pub error_type: String,
    #[serde(rename = "stackTrace", default)]
    pub stack_trace: Vec<String>,
}

impl Failure {
    #[must_use]
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: error_type.into(),
            stack_trace: Vec::new(),
        }
    }

    /// Describe `err` as a failure record.
    ///
    /// The type tag is the static type name of `E`; the message is
    /// `"{description}: {err}"`, or just `err` when `description` is empty.
    #[must_use]
    pub fn from_error<E: Display + ?Sized>(description: &str, err: &E) -> Self {
        let message = if description.is_empty() {
            err.to_string()
        } else {
            format!("{description}: {err}")
        };
        Self::new(message, type_name::<E>())
    }

    #[must_use]
    pub fn with_stack_trace<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stack_trace = frames.into_iter().map(Into::into).collect();
        self
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
