//! Per-invocation context.
//!
//! A [`Context`] travels next to the payload through every middleware. It is
//! never changed in place: each `with_*` call consumes the context and hands
//! back a derived one, so a clone kept by an outer middleware still sees the
//! values it had before the call went deeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Key under which a value is stored in a [`Context`].
///
/// Two keys only match when both the kind and the name match, so parameters
/// injected by the parameters middleware cannot collide with entries that
/// unrelated code stores under [`ContextKey::Custom`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ContextKey {
    /// Default kind used for fetched parameters.
    Parameter(String),
    /// Caller-chosen key.
    Custom(String),
}

impl ContextKey {
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter(name.into())
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }
}

/// Builds the context key for a parameter name.
pub type KeyFn = Arc<dyn Fn(&str) -> ContextKey + Send + Sync + 'static>;

/// The default [`KeyFn`]: the raw name under [`ContextKey::Parameter`].
pub fn parameter_key() -> KeyFn {
    Arc::new(|name| ContextKey::Parameter(name.to_owned()))
}

/// Invocation context handed to every handler.
#[derive(Clone, Debug, Default)]
pub struct Context {
    request_id: Option<Arc<str>>,
    deadline: Option<Instant>,
    values: Arc<HashMap<ContextKey, String>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Every outbound call made on behalf of this invocation must finish
    /// before `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a derived context that also carries `key → value`.
    pub fn with_value(mut self, key: ContextKey, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.values).insert(key, value.into());
        self
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn value(&self, key: &ContextKey) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Shorthand for `value(&ContextKey::Parameter(name))`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.value(&ContextKey::Parameter(name.to_owned()))
    }
}
