//! The handler capability: "run with (context, invocation), report an error".
//!
//! Implement [`Handler`] on a type, or wrap a closure with [`handler_fn`].
//! Both go through the same dispatch boundary.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use crate::context::InvocationContext;
use crate::invocation::Invocation;

/// Handler execution future type alias.
pub type HandlerFut<'a, E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send + 'a>>;

/// User logic run once per invocation.
///
/// A handler may send its own result through the invocation. If it returns
/// without doing so, `Ok(())` becomes an empty success response and `Err`
/// becomes a failure report tagged with the error's type name.
pub trait Handler: Send + Sync {
    type Error: fmt::Display + fmt::Debug + Send + 'static;

    fn run<'a>(
        &'a self,
        context: InvocationContext,
        invocation: &'a mut Invocation,
    ) -> HandlerFut<'a, Self::Error>;
}

impl<H: Handler + ?Sized> Handler for &H {
    type Error = H::Error;

    fn run<'a>(
        &'a self,
        context: InvocationContext,
        invocation: &'a mut Invocation,
    ) -> HandlerFut<'a, Self::Error> {
        (**self).run(context, invocation)
    }
}

/// Closure-backed [`Handler`], built by [`handler_fn`].
pub struct FnHandler<F, E> {
    f: F,
    _error: PhantomData<fn() -> E>,
}

/// Adapt a closure into a [`Handler`].
///
/// ```no_run
/// use runloop_engine::{Invocation, SendError, handler_fn};
///
/// let echo = handler_fn::<_, SendError>(|_ctx, invocation: &mut Invocation| {
///     Box::pin(async move {
///         let body = invocation.body().to_vec();
///         invocation.respond_bytes(body).await
///     })
/// });
/// # let _ = echo;
/// ```
pub fn handler_fn<F, E>(f: F) -> FnHandler<F, E>
where
    F: for<'a> Fn(InvocationContext, &'a mut Invocation) -> HandlerFut<'a, E> + Send + Sync,
    E: fmt::Display + fmt::Debug + Send + 'static,
{
    FnHandler {
        f,
        _error: PhantomData,
    }
}

impl<F, E> Handler for FnHandler<F, E>
where
    F: for<'a> Fn(InvocationContext, &'a mut Invocation) -> HandlerFut<'a, E> + Send + Sync,
    E: fmt::Display + fmt::Debug + Send + 'static,
{
    type Error = E;

    fn run<'a>(
        &'a self,
        context: InvocationContext,
        invocation: &'a mut Invocation,
    ) -> HandlerFut<'a, E> {
        (self.f)(context, invocation)
    }
}

impl<F, E> fmt::Debug for FnHandler<F, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}
