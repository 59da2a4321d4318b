//! Middleware stack.
//!
//! The stack is built once during startup and turned into a single handler
//! with [`Stack::then`]. Order is onion order: the first middleware added sees
//! the request first and the response last.
//!
//! ```text
//! Stack::new().with(a).with(b).then(h)
//!
//!   a ─▶ b ─▶ h
//!   a ◀─ b ◀─┘
//! ```

use std::sync::Arc;

use crate::handler::{BoxedHandler, IntoHandler};
use crate::middleware::{BoxedMiddleware, Middleware};

/// An ordered list of middlewares.
///
/// Build one with [`new`](Stack::new) and [`with`](Stack::with), or from a
/// ready-made list with [`from_middlewares`](Stack::from_middlewares) (or
/// `collect()`). The stack keeps its own copy of the list.
///
/// Registration is meant for single-threaded setup; once [`then`](Stack::then)
/// has produced a handler, later changes to the stack do not affect it.
#[derive(Clone, Default)]
pub struct Stack {
    middlewares: Vec<BoxedMiddleware>,
}

impl Stack {
    pub fn new() -> Self {
        Self { middlewares: Vec::new() }
    }

    /// A stack holding `middlewares` in the given order, first one outermost.
    pub fn from_middlewares(middlewares: impl IntoIterator<Item = BoxedMiddleware>) -> Self {
        Self { middlewares: middlewares.into_iter().collect() }
    }

    /// Adds a middleware after the ones already registered. Returns `self`
    /// for chaining.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.append(middleware);
        self
    }

    /// Adds a middleware at the end of the stack.
    ///
    /// It runs after every middleware already present, so it is the one
    /// closest to the terminal handler.
    pub fn append(&mut self, middleware: impl Middleware) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Applies the stack to `handler` and returns the composed handler.
    ///
    /// Wrapping starts at the handler and walks the list from the last
    /// middleware to the first, so the first one ends up outermost. With no
    /// middlewares a [`BoxedHandler`] comes back as is.
    pub fn then(&self, handler: impl IntoHandler) -> BoxedHandler {
        self.middlewares
            .iter()
            .rev()
            .fold(handler.into_handler(), |next, middleware| middleware.wrap(next))
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl FromIterator<BoxedMiddleware> for Stack {
    fn from_iter<I: IntoIterator<Item = BoxedMiddleware>>(iter: I) -> Self {
        Self::from_middlewares(iter)
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack").field("len", &self.len()).finish()
    }
}
