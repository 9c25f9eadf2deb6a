use runloop_engine::{Handler, HandlerFut, Invocation, InvocationContext, SendError};

/// Sends each invocation body straight back as the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl Handler for Echo {
    type Error = SendError;

    fn run<'a>(
        &'a self,
        context: InvocationContext,
        invocation: &'a mut Invocation,
    ) -> HandlerFut<'a, SendError> {
        Box::pin(async move {
            tracing::debug!(
                request_id = %context.request_id(),
                remaining = ?context.remaining(),
                bytes = invocation.body().len(),
                "Echoing invocation"
            );
            let body = invocation.body().to_vec();
            invocation.respond_bytes(body).await
        })
    }
}
