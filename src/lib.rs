//! # lambda-stack
//!
//! A minimal middleware stack for serverless function handlers, and one
//! middleware worth stacking: preloading parameters and secrets from the
//! local sidecar before the handler runs.
//!
//! ## The contract
//!
//! The function runtime delivers an invocation as a [`Context`] plus raw
//! payload bytes and expects raw bytes or an error back. A [`Handler`] is
//! anything that fits that shape. A middleware wraps one handler into
//! another, and a [`Stack`] applies a list of them in onion order: the first
//! one registered sees the request first and the response last.
//!
//! What the runtime owns, and this crate leaves alone:
//!
//! - **Polling for invocations** and reporting results
//! - **Serialising** typed events (see [`handler::json`] for the adapter)
//! - **Serving parameters** (the sidecar does that; we only ask it)
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use lambda_stack::middleware::{self, ParametersAndSecrets};
//! use lambda_stack::{BoxError, Context, Handler, Stack};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let params = ParametersAndSecrets::new(["/app/prod/api-key"]).build().await?;
//!
//!     let app = Stack::new()
//!         .with(middleware::trace())
//!         .with(params)
//!         .then(greet);
//!
//!     let output = app.invoke(Context::new(), Bytes::from_static(b"{}")).await?;
//!     println!("{}", String::from_utf8_lossy(&output));
//!     Ok(())
//! }
//!
//! async fn greet(ctx: Context, _payload: Bytes) -> Result<String, BoxError> {
//!     let key = ctx.parameter("/app/prod/api-key").ok_or("api key missing")?;
//!     Ok(format!(r#"{{"key_len":{}}}"#, key.len()))
//! }
//! ```

mod context;
mod error;
mod fetch;
mod stack;

pub mod handler;
pub mod middleware;

pub use context::{Context, ContextKey, KeyFn, parameter_key};
pub use error::{BoxError, Error};
pub use fetch::{Fetcher, PARAMETERS_PATH, TOKEN_HEADER};
pub use handler::{BoxedHandler, Handler, HandlerFuture, IntoHandler};
pub use middleware::Middleware;
pub use stack::Stack;
