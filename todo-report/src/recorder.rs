//! Recording todos
//!
//! [`Todos`] is the owned entry point: initialize it once with a
//! [`TodoConfig`], then wrap known-incomplete code in [`Todos::record`]. A
//! process-wide instance backs the free functions [`init`] and [`todo`].

use crate::config::TodoConfig;
use crate::dispatch::{Dispatcher, DrainSummary};
use crate::reporter::Reporter;
use crate::types::{DueDateBehaviour, Result, Timestamp, TodoContext, TodoError};
use chrono::Utc;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// A todo recorder with a write-once configuration
pub struct Todos {
    reporter: OnceLock<Arc<Reporter>>,
    dispatcher: Dispatcher,
}

impl Todos {
    /// Create an uninitialized recorder
    pub const fn new() -> Self {
        Self {
            reporter: OnceLock::new(),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Configure reporting
    ///
    /// Only the first call has any effect. Later calls are ignored, whatever
    /// options they carry.
    pub fn initialize(&self, config: TodoConfig) {
        let mut applied = false;
        self.reporter.get_or_init(|| {
            applied = true;
            log::debug!("Initializing todo reporter: {:?}", config);
            Arc::new(Reporter::from_config(&config))
        });

        if !applied {
            log::debug!("Todo reporter already initialized, ignoring {:?}", config);
        }
    }

    /// Whether [`Todos::initialize`] has been called
    pub fn is_initialized(&self) -> bool {
        self.reporter.get().is_some()
    }

    /// Run `callback` now and report `context` in the background
    ///
    /// Fails without running the callback if the recorder is uninitialized,
    /// or if the todo is overdue under [`DueDateBehaviour::Error`]. A panic in
    /// the callback propagates to the caller. The report itself is never
    /// awaited; its outcome only shows up in the logs and in
    /// [`Todos::drain`].
    pub fn record<F>(&self, callback: F, context: TodoContext) -> Result<()>
    where
        F: FnOnce(),
    {
        let reporter = self.reporter.get().ok_or(TodoError::Uninitialized)?;

        check_due_date(&context, Utc::now())?;

        callback();

        let reporter = Arc::clone(reporter);
        self.dispatcher
            .dispatch(async move { reporter.report(context).await });
        Ok(())
    }

    /// Wait for reports dispatched so far, up to `timeout`
    ///
    /// Must be called from synchronous code; inside an async context it
    /// returns immediately with every outstanding report counted as pending.
    pub fn drain(&self, timeout: Duration) -> DrainSummary {
        self.dispatcher.drain(timeout)
    }
}

impl Default for Todos {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the overdue policy of `context` at time `now`
///
/// Returns [`TodoError::Overdue`] under [`DueDateBehaviour::Error`] and logs a
/// warning under [`DueDateBehaviour::Warn`]. A todo is overdue only once `now`
/// is strictly after its due date.
pub fn check_due_date(context: &TodoContext, now: Timestamp) -> Result<()> {
    let Some(due_date) = context.due_date else {
        return Ok(());
    };

    match context.behaviour() {
        DueDateBehaviour::Ignore => Ok(()),
        _ if now <= due_date => Ok(()),
        DueDateBehaviour::Error => Err(TodoError::Overdue {
            todo: context.todo.clone(),
        }),
        DueDateBehaviour::Warn => {
            log::warn!("{}", context.overdue_message());
            Ok(())
        }
    }
}

static GLOBAL: Todos = Todos::new();

/// The process-wide recorder used by [`init`] and [`todo`]
pub fn global() -> &'static Todos {
    &GLOBAL
}

/// Initialize the process-wide recorder (first call wins)
pub fn init(config: TodoConfig) {
    GLOBAL.initialize(config);
}

/// Record a todo on the process-wide recorder
pub fn todo<F>(callback: F, context: TodoContext) -> Result<()>
where
    F: FnOnce(),
{
    GLOBAL.record(callback, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;

    fn collecting_config(seen: Arc<Mutex<Vec<TodoContext>>>) -> TodoConfig {
        TodoConfig::new().with_call_function(move |ctx| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(ctx);
                true
            }
        })
    }

    #[test]
    fn test_uninitialized_does_not_run_callback() {
        let todos = Todos::new();
        let mut ran = false;

        let result = todos.record(|| ran = true, TodoContext::new("x"));

        assert_eq!(result, Err(TodoError::Uninitialized));
        assert!(!ran);
        assert!(!todos.is_initialized());
    }

    #[test]
    fn test_callback_runs_synchronously() {
        let todos = Todos::new();
        todos.initialize(TodoConfig::new());

        let mut value = 0;
        todos
            .record(
                || value = 7,
                TodoContext::new("please fix me").with_field("some", "context"),
            )
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(todos.drain(Duration::from_secs(5)).failed, 1);
    }

    #[test]
    fn test_call_function_gets_original_context() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let todos = Todos::new();
        todos.initialize(collecting_config(seen.clone()));

        todos.record(|| {}, TodoContext::new("x")).unwrap();
        let summary = todos.drain(Duration::from_secs(5));

        assert_eq!(summary.delivered, 1);
        assert_eq!(*seen.lock().unwrap(), vec![TodoContext::new("x")]);
    }

    #[test]
    fn test_second_initialize_is_ignored() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let todos = Todos::new();

        todos.initialize(collecting_config(first.clone()));
        todos.initialize(collecting_config(second.clone()).with_env("ignored"));

        todos.record(|| {}, TodoContext::new("x")).unwrap();
        todos.drain(Duration::from_secs(5));

        assert_eq!(first.lock().unwrap().len(), 1);
        assert!(second.lock().unwrap().is_empty());
        assert!(first.lock().unwrap()[0].get("env").is_none());
    }

    #[test]
    fn test_overdue_error_skips_callback_and_report() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let todos = Todos::new();
        todos.initialize(collecting_config(seen.clone()));

        let mut ran = false;
        let context = TodoContext::new("z")
            .with_due_date(Utc::now() - ChronoDuration::days(1))
            .with_behaviour(DueDateBehaviour::Error);
        let err = todos.record(|| ran = true, context).unwrap_err();

        assert_eq!(err.to_string(), "z is overdue");
        assert!(!ran);
        assert_eq!(todos.drain(Duration::from_secs(1)), DrainSummary::default());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_future_due_date_behaves_like_none() {
        let todos = Todos::new();
        todos.initialize(TodoConfig::new());

        for behaviour in [
            DueDateBehaviour::Ignore,
            DueDateBehaviour::Warn,
            DueDateBehaviour::Error,
        ] {
            let mut runs = 0;
            let context = TodoContext::new("later")
                .with_due_date(Utc::now() + ChronoDuration::days(1))
                .with_behaviour(behaviour);
            todos.record(|| runs += 1, context).unwrap();
            assert_eq!(runs, 1);
        }
    }

    #[test]
    fn test_check_due_date_boundaries() {
        let due = Utc::now();
        let ctx = TodoContext::new("edge")
            .with_due_date(due)
            .with_behaviour(DueDateBehaviour::Error);

        // Exactly at the due date is not yet overdue
        assert!(check_due_date(&ctx, due).is_ok());
        assert_eq!(
            check_due_date(&ctx, due + ChronoDuration::milliseconds(1)),
            Err(TodoError::Overdue {
                todo: "edge".into()
            })
        );

        let ignored = ctx.clone().with_behaviour(DueDateBehaviour::Ignore);
        assert!(check_due_date(&ignored, due + ChronoDuration::days(365)).is_ok());

        let mut unset = ctx.clone();
        unset.due_date_behaviour = None;
        assert!(check_due_date(&unset, due + ChronoDuration::days(365)).is_ok());

        let warned = ctx.with_behaviour(DueDateBehaviour::Warn);
        assert!(check_due_date(&warned, due + ChronoDuration::days(1)).is_ok());
    }

    #[test]
    fn test_dropping_recorder_keeps_report_alive() {
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Mutex::new(tx);
        {
            let todos = Todos::new();
            todos.initialize(TodoConfig::new().with_call_function(move |ctx| {
                let tx = tx.lock().unwrap().clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    tx.send(ctx.todo).is_ok()
                }
            }));
            todos.record(|| {}, TodoContext::new("outlives recorder")).unwrap();
        }

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            "outlives recorder"
        );
    }

    #[test]
    #[should_panic(expected = "callback failed")]
    fn test_callback_panic_propagates() {
        let todos = Todos::new();
        todos.initialize(TodoConfig::new());
        let _ = todos.record(|| panic!("callback failed"), TodoContext::new("x"));
    }
}
