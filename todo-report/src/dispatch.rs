//! Fire-and-forget execution of reports
//!
//! Reports run as tokio tasks. When the caller already runs inside a tokio
//! runtime the task goes there; otherwise the dispatcher starts a small
//! runtime of its own on first use and keeps it for its lifetime. Reports
//! still running when the dispatcher drops are finished on a detached thread.

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

/// Outcome counts returned by [`crate::Todos::drain`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Reports delivered since the previous drain
    pub delivered: usize,
    /// Reports that failed since the previous drain
    pub failed: usize,
    /// Reports still running when the drain gave up
    pub pending: usize,
}

#[derive(Default)]
struct Outcomes {
    delivered: AtomicUsize,
    failed: AtomicUsize,
}

pub(crate) struct Dispatcher {
    runtime: Mutex<Option<Runtime>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    outcomes: Mutex<Option<Arc<Outcomes>>>,
}

impl Dispatcher {
    pub(crate) const fn new() -> Self {
        Self {
            runtime: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
            outcomes: Mutex::new(None),
        }
    }

    /// Spawn `report` in the background without waiting for it
    pub(crate) fn dispatch<F>(&self, report: F)
    where
        F: Future<Output = bool> + Send + 'static,
    {
        let outcomes = self.outcomes();
        let task = async move {
            let counter = if report.await {
                &outcomes.delivered
            } else {
                &outcomes.failed
            };
            counter.fetch_add(1, Ordering::Relaxed);
        };

        let handle = match Handle::try_current() {
            Ok(handle) => handle.spawn(task),
            Err(_) => match self.owned_handle() {
                Ok(handle) => handle.spawn(task),
                Err(e) => {
                    log::error!("Failed to start todo report runtime: {}", e);
                    self.outcomes().failed.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            },
        };

        let mut pending = lock(&self.pending);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Block until every dispatched report finishes or `timeout` elapses
    pub(crate) fn drain(&self, timeout: Duration) -> DrainSummary {
        let handles = std::mem::take(&mut *lock(&self.pending));

        if Handle::try_current().is_ok() {
            log::error!("Todo reports cannot be drained from within an async context");
            let pending = handles.iter().filter(|h| !h.is_finished()).count();
            lock(&self.pending).extend(handles);
            return DrainSummary {
                pending,
                ..Default::default()
            };
        }

        let unfinished = match self.owned_handle() {
            Ok(runtime) => runtime.block_on(async move {
                let deadline = tokio::time::Instant::now() + timeout;
                let mut unfinished = Vec::new();
                for mut handle in handles {
                    if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                        unfinished.push(handle);
                    }
                }
                unfinished
            }),
            Err(e) => {
                log::error!("Failed to start todo report runtime: {}", e);
                handles
            }
        };

        let pending = unfinished.len();
        lock(&self.pending).extend(unfinished);

        let outcomes = self.outcomes();
        DrainSummary {
            delivered: outcomes.delivered.swap(0, Ordering::Relaxed),
            failed: outcomes.failed.swap(0, Ordering::Relaxed),
            pending,
        }
    }

    fn outcomes(&self) -> Arc<Outcomes> {
        lock(&self.outcomes).get_or_insert_with(Arc::default).clone()
    }

    fn owned_handle(&self) -> io::Result<Handle> {
        let mut runtime = lock(&self.runtime);
        if let Some(runtime) = runtime.as_ref() {
            return Ok(runtime.handle().clone());
        }

        let built = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("todo-report")
            .enable_all()
            .build()?;
        let handle = built.handle().clone();
        *runtime = Some(built);
        Ok(handle)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let runtime = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(runtime) = runtime else {
            // Reports on an ambient runtime keep running there
            return;
        };

        let pending = self.pending.get_mut().unwrap_or_else(PoisonError::into_inner);
        let handles: Vec<_> = std::mem::take(pending)
            .into_iter()
            .filter(|h| !h.is_finished())
            .collect();
        if handles.is_empty() {
            runtime.shutdown_background();
            return;
        }

        // In-flight reports are never cancelled: hand the runtime to a thread
        // that waits for them and then shuts it down.
        log::debug!("Finishing {} todo report(s) in the background", handles.len());
        let finisher = std::thread::Builder::new()
            .name("todo-report-finish".into())
            .spawn(move || {
                runtime.block_on(async move {
                    for handle in handles {
                        let _ = handle.await;
                    }
                });
                runtime.shutdown_background();
            });
        if let Err(e) = finisher {
            log::warn!("Failed to keep todo reports alive, dropping them: {}", e);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
