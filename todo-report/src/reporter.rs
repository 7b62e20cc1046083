//! Report delivery
//!
//! The [`Reporter`] is derived once from a [`TodoConfig`]. Every report runs
//! the middleware chain and then hands the result to exactly one delivery
//! target: the URL if configured, else the call function, else nothing.
//! Failures stop here: they are logged and the report counts as undelivered.

use crate::config::{CallFunction, TodoConfig};
use crate::middleware::{apply_chain, Middleware};
use crate::transport;
use crate::types::{panic_message, DeliveryError, TodoContext};
use std::panic::{self, AssertUnwindSafe};

/// Where a transformed context ends up
enum Delivery {
    Http { client: reqwest::Client, url: String },
    /// The HTTP client could not be built; every report fails with this reason
    HttpUnavailable(String),
    Function(CallFunction),
    Nowhere,
}

pub(crate) struct Reporter {
    middleware: Vec<Middleware>,
    delivery: Delivery,
}

impl Reporter {
    pub(crate) fn from_config(config: &TodoConfig) -> Self {
        let delivery = match (&config.url, &config.call_function) {
            (Some(url), _) => match reqwest::Client::builder().build() {
                Ok(client) => Delivery::Http {
                    client,
                    url: url.clone(),
                },
                Err(e) => {
                    log::error!("Failed to build HTTP client for {}: {}", url, e);
                    Delivery::HttpUnavailable(e.to_string())
                }
            },
            (None, Some(call)) => Delivery::Function(call.clone()),
            (None, None) => Delivery::Nowhere,
        };

        Self {
            middleware: config.effective_middleware(),
            delivery,
        }
    }

    /// Transform and deliver `context`, returning whether delivery succeeded
    ///
    /// Never fails and never panics.
    pub(crate) async fn report(&self, context: TodoContext) -> bool {
        let todo = context.todo.clone();
        match self.try_report(context).await {
            Ok(delivered) => {
                log::debug!("Todo '{}' reported (delivered: {})", todo, delivered);
                delivered
            }
            Err(e) => {
                log::error!("Failed to report todo '{}': {}", todo, e);
                false
            }
        }
    }

    async fn try_report(&self, context: TodoContext) -> Result<bool, DeliveryError> {
        let context = self.transform(context)?;

        match &self.delivery {
            Delivery::Http { client, url } => transport::post_context(client, url, &context).await,
            Delivery::HttpUnavailable(reason) => Err(DeliveryError::ClientUnavailable(reason.clone())),
            Delivery::Function(call) => {
                let future = panic::catch_unwind(AssertUnwindSafe(|| call(context)))
                    .map_err(|payload| DeliveryError::CallFunction(panic_message(&*payload)))?;

                // A panic while polling is contained by the task boundary
                tokio::spawn(future).await.map_err(|e| {
                    let reason = if e.is_panic() {
                        panic_message(&*e.into_panic())
                    } else {
                        e.to_string()
                    };
                    DeliveryError::CallFunction(reason)
                })
            }
            Delivery::Nowhere => Ok(false),
        }
    }

    fn transform(&self, context: TodoContext) -> Result<TodoContext, DeliveryError> {
        let mut context =
            panic::catch_unwind(AssertUnwindSafe(|| apply_chain(&self.middleware, context)))
                .map_err(|payload| DeliveryError::Middleware(panic_message(&*payload)))?;
        // Middleware may have written reserved keys into `extra` directly
        context.normalize();
        Ok(context)
    }
}
