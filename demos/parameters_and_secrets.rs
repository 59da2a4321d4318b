//! Parameters-and-secrets demo.
//!
//! Loads the comma-separated parameter names in `SSMNAMES` once at start-up
//! into `SSM_*` environment variables, then runs one invocation through a
//! stack that also puts the values into the context.
//!
//! Run inside a function environment where the sidecar is available:
//!   SSMNAMES=/lambda-stack-demo/foo,/lambda-stack-demo/bar \
//!   cargo run --example parameters_and_secrets

use std::env;

use bytes::Bytes;
use lambda_stack::middleware::{self, ParametersAndSecrets};
use lambda_stack::{BoxError, Context, Handler, Stack, handler};
use serde_json::{Value, json};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt::init();

    let names: Vec<String> = env::var("SSMNAMES")
        .unwrap_or_default()
        .split(',')
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect();

    let params = ParametersAndSecrets::new(names).set_env("SSM_").build().await?;

    let app = Stack::new()
        .with(middleware::trace())
        .with(params)
        .then(handler::json(report));

    let ctx = Context::new().with_request_id("demo-1");
    let output = app.invoke(ctx, Bytes::from_static(b"{}")).await?;
    println!("{}", String::from_utf8_lossy(&output));
    Ok(())
}

async fn report(ctx: Context, _event: Value) -> Result<Value, BoxError> {
    Ok(json!({
        "env_foo": env::var("SSM_FOO").ok(),
        "env_bar": env::var("SSM_BAR").ok(),
        "foo": ctx.parameter("/lambda-stack-demo/foo"),
        "bar": ctx.parameter("/lambda-stack-demo/bar"),
    }))
}
