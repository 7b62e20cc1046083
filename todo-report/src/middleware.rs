//! Context transformers applied before a report is delivered

use crate::types::TodoContext;
use serde_json::Value;
use std::sync::Arc;

/// A context transformer
///
/// Middleware take ownership of the context and return the context to hand to
/// the next transformer (or to delivery, for the last one in the chain).
pub type Middleware = Arc<dyn Fn(TodoContext) -> TodoContext + Send + Sync>;

/// Wrap a closure as [`Middleware`]
pub fn from_fn<F>(f: F) -> Middleware
where
    F: Fn(TodoContext) -> TodoContext + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Middleware that sets `key` to `value` on every report
pub fn insert_field(key: impl Into<String>, value: impl Into<Value>) -> Middleware {
    let key = key.into();
    let value = value.into();
    from_fn(move |mut ctx| {
        ctx.insert(key.clone(), value.clone());
        ctx
    })
}

/// Middleware that sets `key` only if the context does not already carry it
pub(crate) fn insert_missing_field(key: impl Into<String>, value: impl Into<Value>) -> Middleware {
    let key = key.into();
    let value = value.into();
    from_fn(move |mut ctx| {
        if !ctx.extra.contains_key(&key) {
            ctx.insert(key.clone(), value.clone());
        }
        ctx
    })
}

/// Run `context` through `chain` left to right
pub fn apply_chain(chain: &[Middleware], context: TodoContext) -> TodoContext {
    chain.iter().fold(context, |acc, middleware| middleware(acc))
}
