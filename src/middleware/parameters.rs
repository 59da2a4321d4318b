//! Parameters-and-secrets middleware.
//!
//! Loads named values from the local parameters-and-secrets sidecar and puts
//! them into the invocation [`Context`] before the handler runs.
//!
//! ```rust,no_run
//! use lambda_stack::{BoxError, Context, Stack, handler};
//! use lambda_stack::middleware::ParametersAndSecrets;
//!
//! # async fn run() -> Result<(), BoxError> {
//! let params = ParametersAndSecrets::new(["/app/prod/db-password"]).build().await?;
//!
//! let app = Stack::new().with(params).then(handler::json(
//!     |ctx: Context, _: serde_json::Value| async move {
//!         let password = ctx.parameter("/app/prod/db-password").unwrap_or_default().to_owned();
//!         Ok::<_, BoxError>(password.len())
//!     },
//! ));
//! # Ok(())
//! # }
//! ```
//!
//! # Environment mode
//!
//! With [`set_env`](ParametersAndSecrets::set_env) the values are also exported
//! as process environment variables named `<prefix><LAST SEGMENT>`, once while
//! building and again on every invocation. `/app/prod/db-password` with prefix
//! `SSM_` becomes `SSM_DB-PASSWORD`. Two names ending in the same segment
//! write the same variable; the last write wins.
//!
//! The process environment is global. Invocations that run concurrently and
//! receive different values race on the same variables, and nothing here
//! prevents that. Prefer reading values from the context.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::Client;
use tracing::info;

use crate::context::{Context, ContextKey, KeyFn, parameter_key};
use crate::error::Error;
use crate::fetch::Fetcher;
use crate::handler::{BoxedHandler, Handler, HandlerFuture, IntoHandler};
use crate::middleware::Middleware;
use crate::stack::Stack;

/// Session token presented to the sidecar. Required.
pub const SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";

/// Overrides the sidecar port.
pub const PORT_ENV: &str = "PARAMETERS_SECRETS_EXTENSION_HTTP_PORT";

/// Port the sidecar listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 2773;

/// Configuration for the parameters-and-secrets middleware.
///
/// Everything except the names is optional. Call
/// [`build`](ParametersAndSecrets::build) to get the middleware.
pub struct ParametersAndSecrets {
    names: Vec<String>,
    port: Option<u16>,
    client: Option<Client>,
    with_decryption: Option<bool>,
    key_fn: Option<KeyFn>,
    env_prefix: Option<String>,
}

impl ParametersAndSecrets {
    pub fn new<I>(names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            port: None,
            client: None,
            with_decryption: None,
            key_fn: None,
            env_prefix: None,
        }
    }

    /// Sidecar port. Without it, `PARAMETERS_SECRETS_EXTENSION_HTTP_PORT` is
    /// used, then 2773.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Whether the sidecar decrypts `SecureString` values. Defaults to `true`.
    pub fn with_decryption(mut self, with_decryption: bool) -> Self {
        self.with_decryption = Some(with_decryption);
        self
    }

    /// Chooses the context key each name is stored under. Defaults to
    /// [`ContextKey::Parameter`] with the raw name.
    pub fn context_key(
        mut self,
        key_fn: impl Fn(&str) -> ContextKey + Send + Sync + 'static,
    ) -> Self {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    /// Also export every value as an environment variable named
    /// `prefix + UPPERCASE(last path segment)`.
    pub fn set_env(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Resolves the configuration and returns the middleware.
    ///
    /// Fails without touching the network when `AWS_SESSION_TOKEN` is missing
    /// or the port override is not a number. In environment mode the values
    /// are fetched and exported here, and a failed fetch fails the build.
    pub async fn build(self) -> Result<ParametersMiddleware, Error> {
        let port = resolve_port(self.port, std::env::var(PORT_ENV).ok())?;
        let token = std::env::var(SESSION_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty())
            .ok_or(Error::MissingSessionToken)?;

        let client = match self.client {
            Some(client) => client,
            // The sidecar is always local; never route it through a proxy.
            None => Client::builder().no_proxy().build().map_err(Error::Client)?,
        };
        let fetcher = Fetcher::new(client, port, token)
            .with_decryption(self.with_decryption.unwrap_or(true));

        let inner = Inner {
            names: self.names,
            fetcher,
            key_fn: self.key_fn.unwrap_or_else(parameter_key),
            env_prefix: self.env_prefix,
        };

        if let Some(prefix) = &inner.env_prefix {
            let values = inner.fetcher.fetch(&inner.names, None).await?;
            export_env(prefix, &values);
            info!(port, count = values.len(), "parameters exported to environment");
        }

        Ok(ParametersMiddleware { inner: Arc::new(inner) })
    }
}

/// Builds the middleware from `config` and applies it to `handler`.
pub async fn wrap(
    handler: impl IntoHandler,
    config: ParametersAndSecrets,
) -> Result<BoxedHandler, Error> {
    let middleware = config.build().await?;
    Ok(Stack::new().with(middleware).then(handler))
}

/// Explicit port, else the environment override, else [`DEFAULT_PORT`].
fn resolve_port(explicit: Option<u16>, from_env: Option<String>) -> Result<u16, Error> {
    if let Some(port) = explicit {
        return Ok(port);
    }
    match from_env.filter(|value| !value.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|source| Error::InvalidPort { value, source }),
        None => Ok(DEFAULT_PORT),
    }
}

/// `SSM_` + `/app/prod/db` → `SSM_DB`.
fn env_key(prefix: &str, name: &str) -> String {
    let last = name.rsplit('/').next().unwrap_or(name);
    format!("{prefix}{}", last.to_uppercase())
}

fn export_env(prefix: &str, values: &HashMap<String, String>) {
    for (name, value) in values {
        // SAFETY: the environment is shared by the whole process. Exporting
        // is opt-in and documented as unsound when invocations that see
        // different values run concurrently.
        unsafe { std::env::set_var(env_key(prefix, name), value) };
    }
}

/// The middleware produced by [`ParametersAndSecrets::build`].
#[derive(Clone)]
pub struct ParametersMiddleware {
    inner: Arc<Inner>,
}

struct Inner {
    names: Vec<String>,
    fetcher: Fetcher,
    key_fn: KeyFn,
    env_prefix: Option<String>,
}

impl Middleware for ParametersMiddleware {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        BoxedHandler::new(ParametersHandler { inner: Arc::clone(&self.inner), next })
    }
}

struct ParametersHandler {
    inner: Arc<Inner>,
    next: BoxedHandler,
}

impl Handler for ParametersHandler {
    fn invoke(&self, ctx: Context, payload: Bytes) -> HandlerFuture {
        let inner = Arc::clone(&self.inner);
        let next = self.next.clone();

        Box::pin(async move {
            let values = inner.fetcher.fetch(&inner.names, ctx.deadline()).await?;

            let ctx = values.iter().fold(ctx, |ctx, (name, value)| {
                ctx.with_value((inner.key_fn)(name), value.as_str())
            });
            if let Some(prefix) = &inner.env_prefix {
                export_env(prefix, &values);
            }

            next.invoke(ctx, payload).await
        })
    }
}
