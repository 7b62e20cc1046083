//! Todo Reporter Library
//!
//! Marks a piece of code as a known-incomplete "todo" while still running it.
//! Each time the code runs, the todo's due date can be checked and the todo is
//! reported, in the background, to an HTTP endpoint or a user-supplied async
//! function after passing through a chain of middleware.
//!
//! # Example Usage
//!
//! ```no_run
//! use todo_report::{middleware, DueDateBehaviour, TodoConfig, TodoContext, Todos};
//! use chrono::{TimeZone, Utc};
//!
//! let todos = Todos::new();
//! todos.initialize(
//!     TodoConfig::new()
//!         .with_url("http://localhost:8080/todos")
//!         .add_middleware(middleware::insert_field("service", "billing")),
//! );
//!
//! let context = TodoContext::new("replace the linear scan with an index")
//!     .with_due_date(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
//!     .with_behaviour(DueDateBehaviour::Warn)
//!     .with_field("owner", "payments");
//!
//! let mut total = 0;
//! todos
//!     .record(|| total = (1..=10).sum(), context)
//!     .expect("todo is not overdue");
//! assert_eq!(total, 55);
//! ```

// Public modules
pub mod config;
pub mod middleware;
pub mod recorder;
pub mod types;

// Re-export main types for convenience
pub use config::{BoxFuture, CallFunction, TodoConfig};
pub use dispatch::DrainSummary;
pub use middleware::Middleware;
pub use recorder::{check_due_date, global, init, todo, Todos};
pub use types::{
    DeliveryError, DueDateBehaviour, Result, Timestamp, TodoContext, TodoError, RESERVED_KEYS,
};

// Internal modules (not exposed in public API)
mod dispatch;
mod reporter;
mod transport;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
