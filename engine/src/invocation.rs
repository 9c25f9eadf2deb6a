//! One unit of work and its single-response protocol.
//!
//! An [`Invocation`] is populated by [`Runtime::next_invocation`] and then
//! accepts exactly one terminal send: either a success ([`Invocation::respond`]
//! and friends) or a failure report ([`Invocation::fail`],
//! [`Invocation::fail_with_error`]). The completion flag flips as soon as the
//! endpoint answers at all, so a rejected send is never retried.
//!
//! Sends check their preconditions before touching the network, in order:
//!
//! 1. already completed → [`SendError::AlreadyCompleted`]
//! 2. not bound to an endpoint by a successful fetch → [`SendError::Unbound`]
//! 3. empty request id → [`SendError::MissingRequestId`]
//!
//! [`Runtime::next_invocation`]: crate::Runtime::next_invocation

use std::fmt::Display;

use reqwest::Body;
use runloop_config::Endpoint;
use runloop_types::protocol::{ERROR_SEGMENT, ERROR_TYPE_HEADER, RESPONSE_SEGMENT};
use runloop_types::{Failure, RequestId, StatusError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::context::InvocationContext;

/// Why a response or failure report was not delivered.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("invocation is marked as done, cannot send another response")]
    AlreadyCompleted,
    #[error("invocation was not fetched successfully, refusing to send")]
    Unbound,
    #[error("invocation has no request id")]
    MissingRequestId,
    #[error("unable to encode response body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("unable to send response: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("runtime rejected response: {0}")]
    Rejected(#[source] StatusError),
}

/// Connection handle an invocation uses to deliver its result.
///
/// A cheap clone of the runtime's response client and base URL.
#[derive(Debug, Clone)]
pub(crate) struct ResponseSink {
    pub(crate) client: reqwest::Client,
    pub(crate) endpoint: Endpoint,
}

/// A fetched invocation: its metadata, payload and completion state.
#[derive(Debug)]
pub struct Invocation {
    sink: Option<ResponseSink>,
    completed: bool,
    context: InvocationContext,
    request_id: RequestId,
    invoked_function_arn: String,
    trace_id: String,
    body: Vec<u8>,
}

impl Default for Invocation {
    fn default() -> Self {
        Self::new()
    }
}

impl Invocation {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sink: None,
            completed: false,
            context: InvocationContext::spent(),
            request_id: RequestId::default(),
            invoked_function_arn: String::new(),
            trace_id: String::new(),
            body: Vec::new(),
        }
    }

    /// Make the invocation ready for the next fetch.
    ///
    /// Cancels the previous context, drops the endpoint binding and clears
    /// every field. The body buffer keeps its allocation.
    pub fn reset(&mut self) {
        self.context.cancel();
        self.context = InvocationContext::spent();
        self.sink = None;
        self.completed = false;
        self.request_id.clear();
        self.invoked_function_arn.clear();
        self.trace_id.clear();
        self.body.clear();
    }

    pub(crate) fn populate(
        &mut self,
        context: InvocationContext,
        invoked_function_arn: &str,
        trace_id: &str,
    ) {
        self.request_id = context.request_id().clone();
        self.context = context;
        invoked_function_arn.clone_into(&mut self.invoked_function_arn);
        trace_id.clone_into(&mut self.trace_id);
    }

    pub(crate) fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    pub(crate) fn bind(&mut self, sink: ResponseSink) {
        self.sink = Some(sink);
    }

    #[must_use]
    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    #[must_use]
    pub fn invoked_function_arn(&self) -> &str {
        &self.invoked_function_arn
    }

    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// True once a response or failure has been delivered, or delivery was
    /// attempted and the endpoint answered.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.sink.is_some()
    }

    /// Send a success response. `None` sends an empty body.
    ///
    /// Buffered bodies advertise their length; streamed bodies are sent
    /// with an unknown length.
    pub async fn respond(&mut self, body: Option<Body>) -> Result<(), SendError> {
        self.send(RESPONSE_SEGMENT, None, body).await
    }

    pub async fn respond_bytes(&mut self, body: impl Into<Vec<u8>>) -> Result<(), SendError> {
        self.respond(Some(Body::from(body.into()))).await
    }

    pub async fn respond_string(&mut self, body: impl Into<String>) -> Result<(), SendError> {
        self.respond(Some(Body::from(body.into()))).await
    }

    /// Serialize `value` as the success body. An encoding failure sends
    /// nothing and leaves the invocation open.
    pub async fn respond_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), SendError> {
        let body = serde_json::to_vec(value).map_err(SendError::Encode)?;
        self.respond_bytes(body).await
    }

    /// Send a failure report.
    ///
    /// An empty `error_type` omits the type header; `None` detail sends an
    /// empty body.
    pub async fn fail(
        &mut self,
        error_type: &str,
        detail: Option<&Failure>,
    ) -> Result<(), SendError> {
        let body = detail
            .map(|failure| failure.to_json().map(Body::from))
            .transpose()
            .map_err(SendError::Encode)?;
        let error_type = (!error_type.is_empty()).then_some(error_type);
        self.send(ERROR_SEGMENT, error_type, body).await
    }

    /// Report `err` as a failure, tagged with its type name.
    pub async fn fail_with_error<E: Display + ?Sized>(
        &mut self,
        description: &str,
        err: &E,
    ) -> Result<(), SendError> {
        let failure = Failure::from_error(description, err);
        let error_type = failure.error_type.clone();
        self.fail(&error_type, Some(&failure)).await
    }

    async fn send(
        &mut self,
        suffix: &str,
        error_type: Option<&str>,
        body: Option<Body>,
    ) -> Result<(), SendError> {
        if self.completed {
            return Err(SendError::AlreadyCompleted);
        }
        let Some(sink) = self.sink.as_ref() else {
            return Err(SendError::Unbound);
        };
        if self.request_id.is_empty() {
            return Err(SendError::MissingRequestId);
        }

        let url = sink.endpoint.invocation(self.request_id.as_str(), suffix);
        tracing::debug!(request_id = %self.request_id, %url, "Sending invocation result");

        let mut request = sink
            .client
            .post(url)
            .body(body.unwrap_or_else(|| Body::from(Vec::new())));
        if let Some(error_type) = error_type {
            request = request.header(ERROR_TYPE_HEADER, error_type);
        }

        let response = request.send().await.map_err(SendError::Transport)?;
        // The endpoint answered, so delivery was attempted and must not repeat.
        self.completed = true;

        match StatusError::classify(response.status().as_u16()) {
            Some(status) => Err(SendError::Rejected(status)),
            None => Ok(()),
        }
    }
}
