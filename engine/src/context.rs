//! Deadline-bound cancellation context handed to handlers.

use std::time::{Duration, SystemTime};

use runloop_types::{Deadline, RequestId};
use tokio_util::sync::CancellationToken;

/// Per-invocation execution context.
///
/// Cloning is cheap and every clone observes the same cancellation. The
/// context is cancelled as soon as the handler returns or panics, again when
/// its invocation is reset, and counts as cancelled once the deadline passes. Nothing enforces the deadline on
/// the handler; work that spawns its own tasks has to watch
/// [`InvocationContext::cancelled`].
#[derive(Debug, Clone)]
pub struct InvocationContext {
    request_id: RequestId,
    deadline: Deadline,
    token: CancellationToken,
}

impl InvocationContext {
    #[must_use]
    pub fn new(request_id: RequestId, deadline: Deadline) -> Self {
        Self {
            request_id,
            deadline,
            token: CancellationToken::new(),
        }
    }

    /// Placeholder held by an invocation between fetches: already cancelled,
    /// already past its deadline.
    #[must_use]
    pub fn spent() -> Self {
        let context = Self::new(RequestId::default(), Deadline::expired());
        context.cancel();
        context
    }

    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    #[must_use]
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.remaining(SystemTime::now())
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.has_passed(SystemTime::now())
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Resolves on explicit cancellation or when the deadline passes.
    pub async fn cancelled(&self) {
        tokio::select! {
            () = self.token.cancelled() => {}
            () = tokio::time::sleep(self.remaining()) => {}
        }
    }

    /// A child token cancelled together with this context, for spawned work.
    ///
    /// The child does not observe the deadline on its own, but it fires when
    /// the handler finishes.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
