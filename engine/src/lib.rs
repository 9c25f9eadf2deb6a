//! Invocation engine for runloop.
//!
//! # Architecture
//!
//! - [`Runtime`] owns the connection to the runtime API: a long-poll client for
//!   fetching work, a bounded client for delivering results, and the
//!   [`Backoff`] bookkeeping.
//! - [`Invocation`] is one unit of work plus its single-response protocol.
//! - [`dispatch`] runs a [`Handler`] with panic containment and makes sure
//!   exactly one result is delivered.
//! - [`Runtime::run`] sequences fetch, dispatch and backoff forever.
//!
//! # Error Handling
//!
//! Handler errors and panics never escape [`dispatch`]; they become failure
//! reports. Only fetch failures and failed deliveries reach the loop, which
//! logs them and backs off.

mod backoff;
mod client;
mod context;
mod dispatch;
mod handler;
mod invocation;
mod runtime;

pub use backoff::{Backoff, FREE_FAILURES, INITIAL_DELAY};
pub use client::{response_client, wait_client};
pub use context::InvocationContext;
pub use dispatch::{DispatchError, HandlerFault, Outcome, dispatch};
pub use handler::{FnHandler, Handler, HandlerFut, handler_fn};
pub use invocation::{Invocation, SendError};
pub use runtime::{FetchError, Runtime, StepReport};

pub use reqwest::Body;
pub use runloop_config::{ConfigError, Endpoint, ResponseTimeouts, RuntimeConfig};
pub use runloop_types::{Deadline, DeadlineError, Failure, RequestId, StatusError};
