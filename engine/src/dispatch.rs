//! Failure containment around handler execution.
//!
//! [`dispatch`] runs a handler and turns whatever happens into exactly one
//! terminal result for the invocation:
//!
//! | Handler behaviour | Result sent by dispatch | Returned |
//! |-------------------|-------------------------|----------|
//! | sent its own result, then returned | nothing | `Ok(Outcome::Responded)` |
//! | returned `Ok(())` | empty success | `Ok(Outcome::Succeeded)` |
//! | returned `Err(e)` | failure, "function invocation failed" | `Ok(Outcome::Failed(..))` |
//! | panicked before sending | failure, "function invocation panicked" | `Ok(Outcome::Panicked(..))` |
//! | panicked after sending | nothing | `Err(DispatchError::PanicAfterResponse(..))` |
//!
//! When the synthesized send itself fails, the send error comes back as
//! `Err`, and that is the only way a handler problem reaches the loop.

use std::any::{Any, type_name};
use std::error::Error as StdError;
use std::io;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use runloop_types::Failure;
use runloop_types::protocol::{FAILED_MESSAGE, PANICKED_MESSAGE};
use thiserror::Error;

use crate::handler::Handler;
use crate::invocation::{Invocation, SendError};

/// What a handler did wrong, described for a failure report.
#[derive(Debug, Clone, Error)]
pub enum HandlerFault {
    /// The handler returned an error.
    #[error("{message}")]
    Returned {
        handler: &'static str,
        error_type: &'static str,
        message: String,
    },
    /// The handler panicked with an error value.
    ///
    /// Recognised payloads are `Box<dyn Error + Send + Sync>`,
    /// `Box<dyn Error + Send>`, `anyhow::Error` and `io::Error`. A concrete
    /// error type passed to `panic_any` cannot be downcast without naming it
    /// and ends up as [`HandlerFault::Panic`].
    #[error("{handler} error: {message}")]
    PanicError {
        handler: &'static str,
        message: String,
    },
    /// The handler panicked with anything else.
    #[error("{handler} panic: {message}")]
    Panic {
        handler: &'static str,
        message: String,
    },
}

impl HandlerFault {
    fn returned<E: std::fmt::Display>(handler: &'static str, err: &E) -> Self {
        Self::Returned {
            handler,
            error_type: type_name::<E>(),
            message: err.to_string(),
        }
    }

    pub(crate) fn from_panic(handler: &'static str, payload: &(dyn Any + Send)) -> Self {
        if let Some(message) = panic_error_message(payload) {
            return Self::PanicError { handler, message };
        }
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panic { handler, message }
    }

    #[must_use]
    pub fn handler(&self) -> &'static str {
        match self {
            Self::Returned { handler, .. }
            | Self::PanicError { handler, .. }
            | Self::Panic { handler, .. } => handler,
        }
    }

    #[must_use]
    pub fn is_panic(&self) -> bool {
        !matches!(self, Self::Returned { .. })
    }
}

/// Render panic payloads that carry an error value.
fn panic_error_message(payload: &(dyn Any + Send)) -> Option<String> {
    if let Some(err) = payload.downcast_ref::<Box<dyn StdError + Send + Sync>>() {
        return Some(err.to_string());
    }
    if let Some(err) = payload.downcast_ref::<Box<dyn StdError + Send>>() {
        return Some(err.to_string());
    }
    if let Some(err) = payload.downcast_ref::<anyhow::Error>() {
        return Some(format!("{err:#}"));
    }
    if let Some(err) = payload.downcast_ref::<io::Error>() {
        return Some(err.to_string());
    }
    None
}

/// How a dispatch that reached the endpoint ended.
#[derive(Debug)]
pub enum Outcome {
    Responded,
    Succeeded,
    Failed(HandlerFault),
    Panicked(HandlerFault),
}

impl Outcome {
    #[must_use]
    pub fn fault(&self) -> Option<&HandlerFault> {
        match self {
            Self::Responded | Self::Succeeded => None,
            Self::Failed(fault) | Self::Panicked(fault) => Some(fault),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unable to send empty success response: {0}")]
    Respond(#[source] SendError),
    #[error("unable to report handler failure ({fault}): {source}")]
    Report {
        fault: HandlerFault,
        #[source]
        source: SendError,
    },
    #[error("{0} (after a response was already sent)")]
    PanicAfterResponse(HandlerFault),
}

/// Run `handler` against `invocation` and guarantee a single terminal result.
///
/// The invocation's context is cancelled once the handler returns or panics,
/// before any synthesized result goes out.
pub async fn dispatch<H: Handler + ?Sized>(
    handler: &H,
    invocation: &mut Invocation,
) -> Result<Outcome, DispatchError> {
    let handler_name = type_name::<H>();
    let context = invocation.context().clone();
    let result = AssertUnwindSafe(handler.run(context.clone(), invocation))
        .catch_unwind()
        .await;
    context.cancel();

    match result {
        Err(payload) => {
            let fault = HandlerFault::from_panic(handler_name, payload.as_ref());
            if invocation.is_completed() {
                return Err(DispatchError::PanicAfterResponse(fault));
            }
            tracing::warn!(request_id = %invocation.request_id(), %fault, "Handler panicked");
            match invocation.fail_with_error(PANICKED_MESSAGE, &fault).await {
                Ok(()) => Ok(Outcome::Panicked(fault)),
                Err(source) => Err(DispatchError::Report { fault, source }),
            }
        }
        Ok(returned) if invocation.is_completed() => {
            if let Err(err) = returned {
                tracing::warn!(
                    request_id = %invocation.request_id(),
                    error = %err,
                    "Handler returned an error after sending its own response"
                );
            }
            Ok(Outcome::Responded)
        }
        Ok(Ok(())) => invocation
            .respond(None)
            .await
            .map(|()| Outcome::Succeeded)
            .map_err(DispatchError::Respond),
        Ok(Err(err)) => {
            let fault = HandlerFault::returned(handler_name, &err);
            // Render before awaiting so the future does not borrow `H::Error`.
            let failure = Failure::from_error(FAILED_MESSAGE, &err);
            match invocation.fail(&failure.error_type, Some(&failure)).await {
                Ok(()) => Ok(Outcome::Failed(fault)),
                Err(source) => Err(DispatchError::Report { fault, source }),
            }
        }
    }
}
