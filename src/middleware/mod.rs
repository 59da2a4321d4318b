//! Middleware layer.
//!
//! A middleware turns one handler into another: it receives the next handler
//! in the chain and returns a handler that does its own work around calling
//! it. That is the right place for cross-cutting concerns such as tracing or
//! loading configuration before the handler runs.
//!
//! A middleware must hand errors coming back from `next` to its caller as they
//! are. It may log them first, but it must not swallow or rewrite them.
//!
//! Built-in middleware:
//! - [`trace`]: per-invocation span with request id, latency and outcome
//! - [`ParametersAndSecrets`]: preloads parameters from the local sidecar

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

use crate::context::Context;
use crate::error::BoxError;
use crate::handler::{BoxedHandler, Handler, HandlerFuture};

mod parameters;
mod trace;

pub use parameters::{
    DEFAULT_PORT, ParametersAndSecrets, ParametersMiddleware, PORT_ENV, SESSION_TOKEN_ENV, wrap,
};
pub use trace::{Trace, trace};

/// Wraps a handler.
///
/// Implemented for every `Fn(BoxedHandler) -> BoxedHandler`, so a closure
/// works as a middleware as is.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

/// A shared, type-erased middleware as stored by a [`Stack`](crate::Stack).
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The rest of the chain, as seen from inside a [`from_fn`] middleware.
pub type Next = BoxedHandler;

/// Builds a middleware from an async function that gets the context, the
/// payload and the rest of the chain.
///
/// ```rust,no_run
/// use lambda_stack::Handler;
/// use lambda_stack::middleware::from_fn;
///
/// let log = from_fn(|ctx, payload, next| async move {
///     println!("[start]");
///     let output = next.invoke(ctx, payload).await;
///     println!("[end]");
///     output
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Context, Bytes, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes, BoxError>> + Send + 'static,
{
    FromFn(Arc::new(f))
}

/// See [`from_fn`].
pub struct FromFn<F>(Arc<F>);

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Context, Bytes, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes, BoxError>> + Send + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        BoxedHandler::new(FromFnHandler { f: Arc::clone(&self.0), next })
    }
}

struct FromFnHandler<F> {
    f: Arc<F>,
    next: BoxedHandler,
}

impl<F, Fut> Handler for FromFnHandler<F>
where
    F: Fn(Context, Bytes, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes, BoxError>> + Send + 'static,
{
    fn invoke(&self, ctx: Context, payload: Bytes) -> HandlerFuture {
        Box::pin((self.f)(ctx, payload, self.next.clone()))
    }
}
