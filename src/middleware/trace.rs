//! Per-invocation tracing span.

use std::time::Instant;

use bytes::Bytes;
use tracing::{Instrument, info, info_span, warn};

use crate::context::Context;
use crate::handler::{BoxedHandler, Handler, HandlerFuture};
use crate::middleware::Middleware;

/// Opens an `invoke` span carrying the request id around everything inside
/// it, then logs how long the invocation took and whether it failed.
///
/// Register it first so the span covers every other middleware.
pub fn trace() -> Trace {
    Trace
}

/// See [`trace`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        BoxedHandler::new(TraceHandler { next })
    }
}

struct TraceHandler {
    next: BoxedHandler,
}

impl Handler for TraceHandler {
    fn invoke(&self, ctx: Context, payload: Bytes) -> HandlerFuture {
        let span = info_span!("invoke", request_id = ctx.request_id().unwrap_or("-"));
        let next = self.next.clone();

        Box::pin(
            async move {
                let started = Instant::now();
                let result = next.invoke(ctx, payload).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;

                match &result {
                    Ok(output) => info!(elapsed_ms, bytes = output.len(), "invocation completed"),
                    Err(e) => warn!(elapsed_ms, error = %e, "invocation failed"),
                }
                result
            }
            .instrument(span),
        )
    }
}
