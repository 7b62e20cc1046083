//! Reporter configuration
//!
//! A [`TodoConfig`] is handed to [`crate::Todos::initialize`] once. It decides
//! where reports go (an HTTP endpoint or a direct function) and which
//! middleware run on the context first.

use crate::middleware::{self, Middleware};
use crate::types::TodoContext;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by a [`CallFunction`]
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Direct delivery function, used when no URL is configured
///
/// Resolves to `true` when the report was accepted.
pub type CallFunction = Arc<dyn Fn(TodoContext) -> BoxFuture<bool> + Send + Sync>;

/// Configuration for the todo reporter
#[derive(Clone, Default)]
pub struct TodoConfig {
    /// Endpoint that receives a JSON POST per report
    pub url: Option<String>,

    /// Transformers applied in order before delivery
    pub middleware: Vec<Middleware>,

    /// Delivery function used when `url` is unset
    pub call_function: Option<CallFunction>,

    /// Environment tag added to reports as `env`
    pub env: Option<String>,
}

impl TodoConfig {
    /// Create an empty configuration (reports go nowhere)
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: deliver reports to `url`
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Builder method: append a middleware to the chain
    pub fn add_middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Builder method: append a closure as middleware
    pub fn add_middleware_fn<F>(self, f: F) -> Self
    where
        F: Fn(TodoContext) -> TodoContext + Send + Sync + 'static,
    {
        self.add_middleware(middleware::from_fn(f))
    }

    /// Builder method: deliver reports through an async function
    pub fn with_call_function<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(TodoContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let call: CallFunction = Arc::new(move |ctx: TodoContext| -> BoxFuture<bool> {
            Box::pin(f(ctx))
        });
        self.call_function = Some(call);
        self
    }

    /// Builder method: tag reports with an environment name
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Middleware chain as it runs at report time
    ///
    /// The environment tag goes first so user middleware can see or
    /// override it.
    pub(crate) fn effective_middleware(&self) -> Vec<Middleware> {
        let mut chain = Vec::with_capacity(self.middleware.len() + 1);
        if let Some(env) = &self.env {
            chain.push(middleware::insert_missing_field("env", env.clone()));
        }
        chain.extend(self.middleware.iter().cloned());
        chain
    }
}

impl fmt::Debug for TodoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TodoConfig")
            .field("url", &self.url)
            .field("middleware", &self.middleware.len())
            .field("call_function", &self.call_function.is_some())
            .field("env", &self.env)
            .finish()
    }
}
