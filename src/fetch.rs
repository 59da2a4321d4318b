//! Parameter fetcher for the parameters-and-secrets sidecar.
//!
//! # Wire format
//!
//! ```text
//! GET http://localhost:<port>/systemsmanager/parameters/get?name=<name>&withDecryption=<bool>
//! X-Aws-Parameters-Secrets-Token: <session token>
//!
//! 200 OK
//! {"Parameter": {"Name": "...", "Value": "...", ...}}
//! ```
//!
//! # Concurrency
//!
//! Every name gets its own tokio task in one [`JoinSet`]. The first task to
//! fail aborts the rest, including requests already in flight, and its error
//! becomes the error of the whole fetch. Values from tasks that did succeed
//! are dropped with the set, so a caller never sees a partial map.
//!
//! Dropping the future returned by [`Fetcher::fetch`] drops the set, which
//! aborts every outstanding task as well.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::Error;

/// Path of the parameter lookup endpoint on the sidecar.
pub const PARAMETERS_PATH: &str = "/systemsmanager/parameters/get";

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "X-Aws-Parameters-Secrets-Token";

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetParameterOutput {
    parameter: Parameter,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Parameter {
    value: String,
}

/// Fetches named values from the local sidecar.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    url: Arc<str>,
    token: Arc<str>,
    with_decryption: bool,
}

impl Fetcher {
    /// Fetcher for the sidecar listening on `localhost:port`.
    ///
    /// Values are decrypted unless [`with_decryption(false)`](Fetcher::with_decryption)
    /// is set.
    pub fn new(client: Client, port: u16, token: impl Into<Arc<str>>) -> Self {
        Self {
            client,
            url: format!("http://localhost:{port}{PARAMETERS_PATH}").into(),
            token: token.into(),
            with_decryption: true,
        }
    }

    pub fn with_decryption(mut self, with_decryption: bool) -> Self {
        self.with_decryption = with_decryption;
        self
    }

    /// Fetches every name concurrently.
    ///
    /// Either every value comes back or the first error does. Each request
    /// gives up once `deadline` passes.
    pub async fn fetch(
        &self,
        names: &[String],
        deadline: Option<Instant>,
    ) -> Result<HashMap<String, String>, Error> {
        let mut tasks = JoinSet::new();
        for name in names {
            let this = self.clone();
            let name = name.clone();
            tasks.spawn(async move {
                let value = match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, this.get(&name))
                        .await
                        .map_err(|_| Error::DeadlineExceeded { name: name.clone() })??,
                    None => this.get(&name).await?,
                };
                Ok::<_, Error>((name, value))
            });
        }

        let mut values = HashMap::with_capacity(names.len());
        while let Some(joined) = tasks.join_next().await {
            match joined.map_err(Error::from).and_then(|r| r) {
                Ok((name, value)) => {
                    values.insert(name, value);
                }
                Err(e) => {
                    warn!(error = %e, pending = tasks.len(), "parameter fetch failed, cancelling the rest");
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }
        Ok(values)
    }

    async fn get(&self, name: &str) -> Result<String, Error> {
        let with_decryption = if self.with_decryption { "true" } else { "false" };
        let response = self
            .client
            .get(&*self.url)
            .query(&[("name", name), ("withDecryption", with_decryption)])
            .header(TOKEN_HEADER, &*self.token)
            .send()
            .await
            .map_err(|source| Error::Request { name: name.to_owned(), source })?;

        let status = response.status();
        // Read the body to the end on every path so the connection goes back
        // to the pool.
        let body = response
            .bytes()
            .await
            .map_err(|source| Error::Request { name: name.to_owned(), source })?;

        if status != StatusCode::OK {
            return Err(Error::Status { name: name.to_owned(), status });
        }

        let output: GetParameterOutput = serde_json::from_slice(&body)
            .map_err(|source| Error::Decode { name: name.to_owned(), source })?;
        debug!(name, "parameter fetched");
        Ok(output.parameter.value)
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("with_decryption", &self.with_decryption)
            .finish()
    }
}
