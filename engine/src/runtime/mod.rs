//! Connection to the runtime API and the invocation loop.
//!
//! ```text
//! Runtime::run -> loop { step() }
//!                         |
//!                         v
//!      next_invocation --Err--> log, backoff
//!            | Ok
//!            v
//!        dispatch ------Err--> log, backoff
//!            | Ok
//!            v
//!        next cycle
//! ```
//!
//! One invocation is in flight at a time. The same [`Invocation`] is reset
//! and refilled on every cycle.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use runloop_config::{Endpoint, RuntimeConfig};
use runloop_types::protocol::{
    DEADLINE_HEADER, INVOKED_FUNCTION_ARN_HEADER, REQUEST_ID_HEADER, TRACE_ID_HEADER,
};
use runloop_types::{Deadline, DeadlineError, RequestId, StatusError};
use thiserror::Error;

use crate::backoff::Backoff;
use crate::client::{response_client, wait_client};
use crate::context::InvocationContext;
use crate::dispatch::{DispatchError, Outcome, dispatch};
use crate::handler::Handler;
use crate::invocation::{Invocation, ResponseSink};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("error waiting for next invocation: {0}")]
    Transport(#[source] reqwest::Error),
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error("cannot parse deadline: {0}")]
    Deadline(#[from] DeadlineError),
    #[error("unable to read payload body: {0}")]
    Body(#[source] reqwest::Error),
}

/// What one loop cycle did.
#[derive(Debug)]
pub enum StepReport {
    FetchFailed(FetchError),
    Dispatched {
        count: u64,
        request_id: RequestId,
        elapsed: Duration,
        result: Result<Outcome, DispatchError>,
    },
}

#[derive(Debug)]
pub struct Runtime {
    wait_client: reqwest::Client,
    sink: ResponseSink,
    backoff: Backoff,
    invocations: u64,
}

impl Runtime {
    pub fn new(config: &RuntimeConfig) -> Result<Self, reqwest::Error> {
        let sink = ResponseSink {
            client: response_client(&config.response)?,
            endpoint: config.endpoint.clone(),
        };
        Ok(Self {
            wait_client: wait_client()?,
            sink,
            backoff: Backoff::new(),
            invocations: 0,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.sink.endpoint
    }

    /// Number of invocations fetched so far.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Failure bookkeeping fed by fetch errors and unhandled dispatch errors.
    #[must_use]
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Wait for the next invocation and load it into `invocation`.
    ///
    /// May block indefinitely. Transport and status failures return before
    /// `invocation` is touched. A bad deadline header returns after the
    /// reset with the invocation left unbound, so it cannot send anything.
    pub async fn next_invocation(&self, invocation: &mut Invocation) -> Result<(), FetchError> {
        let url = self.sink.endpoint.next_invocation();
        tracing::debug!(%url, "Waiting for next invocation");

        let response = self
            .wait_client
            .get(url)
            .send()
            .await
            .map_err(FetchError::Transport)?;
        if let Some(status) = StatusError::expect_ok(response.status().as_u16()) {
            return Err(status.into());
        }

        invocation.reset();
        let headers = response.headers();
        let deadline = Deadline::parse_header(header_str(headers, DEADLINE_HEADER))?;
        let request_id = RequestId::new(header_str(headers, REQUEST_ID_HEADER).unwrap_or_default());
        invocation.populate(
            InvocationContext::new(request_id, deadline),
            header_str(headers, INVOKED_FUNCTION_ARN_HEADER).unwrap_or_default(),
            header_str(headers, TRACE_ID_HEADER).unwrap_or_default(),
        );

        let body = response.bytes().await.map_err(FetchError::Body)?;
        invocation.body_mut().extend_from_slice(&body);
        invocation.bind(self.sink.clone());
        Ok(())
    }

    /// Run one fetch/dispatch cycle, backing off after an unhandled failure.
    pub async fn step<H: Handler + ?Sized>(
        &mut self,
        invocation: &mut Invocation,
        handler: &H,
    ) -> StepReport {
        if let Err(err) = self.next_invocation(invocation).await {
            tracing::error!(error = %err, "Error attempting to fetch payload");
            self.backoff.wait().await;
            return StepReport::FetchFailed(err);
        }

        self.invocations += 1;
        let count = self.invocations;
        let request_id = invocation.request_id().clone();
        tracing::info!(invocation = count, %request_id, "Invocation started");

        let started = Instant::now();
        let result = dispatch(handler, invocation).await;
        let elapsed = started.elapsed();
        tracing::info!(invocation = count, %request_id, ?elapsed, "Invocation complete");

        match &result {
            Ok(outcome) => {
                if let Some(fault) = outcome.fault() {
                    tracing::info!(%request_id, %fault, "Reported handler failure");
                }
            }
            Err(err) => {
                tracing::error!(%request_id, error = %err, "Unhandled function error");
                self.backoff.wait().await;
            }
        }

        StepReport::Dispatched {
            count,
            request_id,
            elapsed,
            result,
        }
    }

    /// Serve invocations forever.
    pub async fn run<H: Handler>(mut self, handler: H) -> Infallible {
        let mut invocation = Invocation::new();
        tracing::info!(endpoint = %self.sink.endpoint, "Started runloop event loop");
        loop {
            self.step(&mut invocation, &handler).await;
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
