//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! A stack composes handlers of *different* concrete types: closures written
//! by the user, the wrappers each middleware produces, typed JSON adapters.
//! Each middleware must be able to hold "the next handler" without knowing
//! which of those it got, so everything is erased behind one trait object.
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn hello(ctx: Context, payload: Bytes) -> Result<Bytes, BoxError>
//!        ↓ stack.then(hello)
//! hello.into_handler()                        ← IntoHandler blanket impl
//!        ↓
//! BoxedHandler(Arc::new(FnHandler(hello)))    ← heap-allocated wrapper
//!        ↓
//! handler.invoke(ctx, payload)                ← one vtable dispatch
//!        ↓
//! Box::pin(async { hello(ctx, payload).await.map(Into::into) })
//! ```
//!
//! Cloning a [`BoxedHandler`] is one atomic increment. Middlewares clone the
//! next handler freely.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::error::BoxError;

/// A heap-allocated, type-erased future resolving to a handler result.
///
/// `Send + 'static` lets tokio move the future across threads and spawn it.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Bytes, BoxError>> + Send + 'static>>;

/// A unit of request processing: context plus raw payload in, raw payload
/// (or an error) out.
///
/// Implement it on your own type for a handler object, then erase it with
/// [`BoxedHandler::new`]. Plain async functions do not need this; pass them
/// to [`Stack::then`](crate::Stack::then) directly.
pub trait Handler: Send + Sync + 'static {
    fn invoke(&self, ctx: Context, payload: Bytes) -> HandlerFuture;
}

/// A shared, type-erased handler.
#[derive(Clone)]
pub struct BoxedHandler(Arc<dyn Handler>);

impl BoxedHandler {
    pub fn new(handler: impl Handler) -> Self {
        Self(Arc::new(handler))
    }

    /// `true` when both handles point at the same handler.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl Handler for BoxedHandler {
    fn invoke(&self, ctx: Context, payload: Bytes) -> HandlerFuture {
        self.0.invoke(ctx, payload)
    }
}

impl std::fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedHandler").finish_non_exhaustive()
    }
}

// ── Conversion ────────────────────────────────────────────────────────────────

/// Anything [`Stack::then`](crate::Stack::then) accepts as a terminal handler.
///
/// Satisfied by:
///
/// ```text
/// async fn name(ctx: Context, payload: Bytes) -> Result<impl Into<Bytes>, impl Into<BoxError>>
/// ```
///
/// by a [`BoxedHandler`] (returned as is, never wrapped twice), and by
/// [`Json`] adapters. The trait is sealed.
pub trait IntoHandler: private::Sealed {
    fn into_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, O, E> private::Sealed for F
where
    F: Fn(Context, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    O: Into<Bytes>,
    E: Into<BoxError>,
{
}

impl<F, Fut, O, E> IntoHandler for F
where
    F: Fn(Context, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    O: Into<Bytes>,
    E: Into<BoxError>,
{
    fn into_handler(self) -> BoxedHandler {
        BoxedHandler::new(FnHandler(self))
    }
}

impl private::Sealed for BoxedHandler {}

impl IntoHandler for BoxedHandler {
    fn into_handler(self) -> BoxedHandler {
        self
    }
}

/// Bridges a plain async function to [`Handler`].
struct FnHandler<F>(F);

impl<F, Fut, O, E> Handler for FnHandler<F>
where
    F: Fn(Context, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    O: Into<Bytes>,
    E: Into<BoxError>,
{
    fn invoke(&self, ctx: Context, payload: Bytes) -> HandlerFuture {
        let fut = (self.0)(ctx, payload);
        Box::pin(async move {
            let out = fut.await.map_err(Into::<BoxError>::into)?;
            Ok::<Bytes, BoxError>(out.into())
        })
    }
}

// ── Typed JSON adapter ────────────────────────────────────────────────────────

/// Adapts a typed handler to the raw byte contract.
///
/// The payload is decoded into `T` with serde_json before `f` runs and the
/// returned value is encoded back. A payload that does not decode fails the
/// invocation and `f` is never called.
///
/// ```rust,no_run
/// use lambda_stack::{BoxError, Context, Stack, handler};
///
/// let h = Stack::new().then(handler::json(|_ctx: Context, name: String| async move {
///     Ok::<_, BoxError>(format!("hello {name}"))
/// }));
/// ```
pub fn json<F, T, Fut, R, E>(f: F) -> Json<F, T>
where
    F: Fn(Context, T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Serialize,
    E: Into<BoxError>,
{
    Json { f: Arc::new(f), _input: PhantomData }
}

/// See [`json`].
pub struct Json<F, T> {
    f: Arc<F>,
    _input: PhantomData<fn(T)>,
}

impl<F, T, Fut, R, E> Handler for Json<F, T>
where
    F: Fn(Context, T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Serialize,
    E: Into<BoxError>,
{
    fn invoke(&self, ctx: Context, payload: Bytes) -> HandlerFuture {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            let input: T = serde_json::from_slice(&payload)?;
            let output = f(ctx, input).await.map_err(Into::<BoxError>::into)?;
            Ok::<Bytes, BoxError>(Bytes::from(serde_json::to_vec(&output)?))
        })
    }
}

impl<F, T> private::Sealed for Json<F, T> where Self: Handler {}

impl<F, T> IntoHandler for Json<F, T>
where
    Self: Handler,
{
    fn into_handler(self) -> BoxedHandler {
        BoxedHandler::new(self)
    }
}
