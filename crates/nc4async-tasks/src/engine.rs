//! Event loop and task submission.
//!
//! [`EventLoop`] owns a current-thread tokio runtime. The thread that calls
//! [`EventLoop::block_on`] is the event-loop thread: it is the only thread
//! on which completion closures run and the only place a [`HostEnv`] exists.
//! The runtime's blocking pool, bounded by
//! [`EngineConfig::worker_threads`], is the worker pool.
//!
//! # Task Flow
//!
//! ```text
//! submit(work, on_complete)
//!   -> Created -> Queued           (caller gets a TaskFuture back)
//!   -> Running                     (work runs on a worker thread)
//!   -> Completing                  (on_complete runs on the event loop)
//!   -> Resolved | Rejected         (the future settles, exactly once)
//! ```
//!
//! An error from `work` rejects the future directly and `on_complete` is
//! never called. An error from `on_complete` rejects the future after the
//! work already ran, so any side effect of the work has persisted.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};
use tokio::task::LocalSet;
use tracing::{debug, error, trace, warn};

use crate::config::EngineConfig;
use crate::deferred::{self, Deferred, TaskFuture};
use crate::error::{TaskError, TaskId};
use crate::lock::FileLifecycleLock;
use crate::status::TaskStatus;

/// Token proving the holder is on the event-loop thread.
///
/// Host values may only be constructed on the event loop; APIs that build
/// them take a `&HostEnv`. The token is `!Send` and can only be obtained from
/// an [`EventLoop`] or an [`Engine`], both of which are themselves `!Send`.
pub struct HostEnv {
    _loop_thread: PhantomData<Rc<()>>,
}

impl HostEnv {
    fn new() -> Self {
        Self {
            _loop_thread: PhantomData,
        }
    }
}

impl fmt::Debug for HostEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostEnv")
    }
}

/// What a task's `work` closure can see on its worker thread.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    task_id: TaskId,
    lock: FileLifecycleLock,
}

impl WorkerContext {
    /// The running task.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// The file-lifecycle lock of the engine that scheduled this task.
    pub fn lock(&self) -> &FileLifecycleLock {
        &self.lock
    }
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Tasks handed to the worker pool.
    pub scheduled: u64,
    /// Futures resolved.
    pub resolved: u64,
    /// Futures rejected, including those rejected without scheduling work.
    pub rejected: u64,
    /// Scheduled tasks that have not settled yet.
    pub in_flight: usize,
}

struct Shared {
    next_id: AtomicU64,
    registry: DashMap<TaskId, TaskStatus>,
    scheduled: AtomicU64,
    resolved: AtomicU64,
    rejected: AtomicU64,
    lock: FileLifecycleLock,
}

impl Shared {
    fn new(lock: FileLifecycleLock) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            registry: DashMap::new(),
            scheduled: AtomicU64::new(0),
            resolved: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            lock,
        }
    }

    fn next_task_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn transition(&self, task_id: TaskId, next: TaskStatus) {
        let Some(mut status) = self.registry.get_mut(&task_id) else {
            warn!(task_id = %task_id, to = %next, "transition for untracked task");
            return;
        };
        let from = *status;
        match from.validate_transition(task_id, &next) {
            Ok(()) => {
                trace!(task_id = %task_id, from = %from, to = %next, "task transition");
                *status = next;
            },
            Err(err) => warn!(error = %err, "ignoring task transition"),
        }
    }

    fn finish(&self, task_id: TaskId, outcome: TaskStatus) {
        self.transition(task_id, outcome);
        self.registry.remove(&task_id);
        if outcome == TaskStatus::Resolved {
            self.resolved.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn stats(&self) -> EngineStats {
        EngineStats {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            in_flight: self.registry.len(),
        }
    }
}

/// The event loop: a current-thread runtime plus a bounded worker pool.
///
/// `EventLoop` is `!Send`; the thread that creates it is the event-loop
/// thread.
///
/// # Examples
///
/// ```
/// use nc4async_tasks::{EngineConfig, EventLoop};
///
/// let event_loop = EventLoop::new(EngineConfig::default().with_worker_threads(2)).unwrap();
/// let stats = event_loop.block_on(|engine| async move { engine.stats() });
/// assert_eq!(stats.scheduled, 0);
/// ```
pub struct EventLoop {
    runtime: Runtime,
    shared: Arc<Shared>,
    _loop_thread: PhantomData<Rc<()>>,
}

impl EventLoop {
    /// Builds an event loop with its own file-lifecycle lock.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Runtime`] if the runtime cannot be built.
    pub fn new(config: EngineConfig) -> Result<Self, TaskError> {
        Self::with_lock(config, FileLifecycleLock::new())
    }

    /// Builds an event loop that uses `lock` to guard file lifecycles.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Runtime`] if the runtime cannot be built.
    pub fn with_lock(config: EngineConfig, lock: FileLifecycleLock) -> Result<Self, TaskError> {
        let worker_threads = config.effective_worker_threads();
        let runtime = Builder::new_current_thread()
            .max_blocking_threads(worker_threads)
            .thread_name(config.thread_name.clone())
            .thread_keep_alive(Duration::from_millis(config.keep_alive_ms))
            .enable_all()
            .build()
            .map_err(|e| TaskError::Runtime(e.to_string()))?;

        debug!(worker_threads, thread_name = %config.thread_name, "event loop started");

        Ok(Self {
            runtime,
            shared: Arc::new(Shared::new(lock)),
            _loop_thread: PhantomData,
        })
    }

    /// Runs the future built by `f` on the event loop and returns its output.
    ///
    /// Tasks submitted but not awaited by the caller are driven to
    /// settlement before this returns.
    pub fn block_on<F, Fut>(&self, f: F) -> Fut::Output
    where
        F: FnOnce(Engine) -> Fut,
        Fut: Future,
    {
        let local = LocalSet::new();
        let engine = Engine::new(Arc::clone(&self.shared));
        let output = local.block_on(&self.runtime, async move { f(engine).await });
        self.runtime.block_on(local);
        output
    }

    /// A host environment token for the event-loop thread.
    pub fn env(&self) -> HostEnv {
        HostEnv::new()
    }

    /// The file-lifecycle lock shared by every task of this loop.
    pub fn lock(&self) -> &FileLifecycleLock {
        &self.shared.lock
    }

    /// Current engine counters.
    pub fn stats(&self) -> EngineStats {
        self.shared.stats()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("stats", &self.shared.stats())
            .finish_non_exhaustive()
    }
}

/// Handle used on the event loop to submit tasks.
///
/// Only available inside [`EventLoop::block_on`]. Cloning is cheap.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
    _loop_thread: PhantomData<Rc<()>>,
}

impl Engine {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            _loop_thread: PhantomData,
        }
    }

    /// Submits a task and returns its future without blocking.
    ///
    /// `work` runs once on a worker thread. If it returns `Ok(result)`,
    /// `on_complete(env, result)` runs once on the event-loop thread and its
    /// return value settles the future. If `work` returns an error or
    /// panics, the future is rejected and `on_complete` is never called.
    ///
    /// # Panics
    ///
    /// Panics if called outside [`EventLoop::block_on`].
    pub fn submit<T, V, E, W, C>(&self, work: W, on_complete: C) -> TaskFuture<V, E>
    where
        T: Send + 'static,
        V: 'static,
        E: From<TaskError> + fmt::Display + Send + 'static,
        W: FnOnce(&WorkerContext) -> Result<T, E> + Send + 'static,
        C: FnOnce(&HostEnv, T) -> Result<V, E> + 'static,
    {
        let task_id = self.shared.next_task_id();
        let (deferred, future) = deferred::channel(task_id);

        self.shared.registry.insert(task_id, TaskStatus::Created);
        self.shared.transition(task_id, TaskStatus::Queued);
        self.shared.scheduled.fetch_add(1, Ordering::Relaxed);
        debug!(task_id = %task_id, "task queued");

        let ctx = WorkerContext {
            task_id,
            lock: self.shared.lock.clone(),
        };
        let worker_shared = Arc::clone(&self.shared);
        let handle = tokio::task::spawn_blocking(move || {
            worker_shared.transition(task_id, TaskStatus::Running);
            work(&ctx)
        });

        let engine = self.clone();
        tokio::task::spawn_local(async move {
            let outcome = match handle.await {
                Ok(Ok(result)) => {
                    engine.shared.transition(task_id, TaskStatus::Completing);
                    let env = HostEnv::new();
                    match panic::catch_unwind(AssertUnwindSafe(|| on_complete(&env, result))) {
                        Ok(outcome) => outcome,
                        Err(payload) => {
                            let message = panic_message(payload);
                            error!(task_id = %task_id, message = %message, "completion panicked");
                            Err(E::from(TaskError::CompletionPanicked { task_id, message }))
                        },
                    }
                },
                Ok(Err(err)) => Err(err),
                Err(join_error) => {
                    let err = if join_error.is_panic() {
                        let message = panic_message(join_error.into_panic());
                        error!(task_id = %task_id, message = %message, "worker panicked");
                        TaskError::WorkerPanicked { task_id, message }
                    } else {
                        TaskError::Abandoned { task_id }
                    };
                    Err(E::from(err))
                },
            };
            engine.settle(deferred, outcome);
        });

        future
    }

    /// Returns a future that is already rejected with `error`.
    ///
    /// No work is scheduled; use this for argument and type errors detected
    /// before a task would be submitted.
    pub fn reject_now<V, E>(&self, error: E) -> TaskFuture<V, E>
    where
        E: fmt::Display,
    {
        let task_id = self.shared.next_task_id();
        self.shared.rejected.fetch_add(1, Ordering::Relaxed);
        debug!(task_id = %task_id, error = %error, "task rejected before scheduling");
        TaskFuture::settled(task_id, Err(error))
    }

    /// Returns a future that is already resolved with `value`.
    pub fn resolve_now<V, E>(&self, value: V) -> TaskFuture<V, E> {
        let task_id = self.shared.next_task_id();
        self.shared.resolved.fetch_add(1, Ordering::Relaxed);
        TaskFuture::settled(task_id, Ok(value))
    }

    /// A host environment token for the event-loop thread.
    pub fn env(&self) -> HostEnv {
        HostEnv::new()
    }

    /// The file-lifecycle lock shared by every task of this engine.
    pub fn lock(&self) -> &FileLifecycleLock {
        &self.shared.lock
    }

    /// Current engine counters.
    pub fn stats(&self) -> EngineStats {
        self.shared.stats()
    }

    /// Status of a task that has not settled yet.
    pub fn status(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.shared.registry.get(&task_id).map(|status| *status)
    }

    /// Number of scheduled tasks that have not settled yet.
    pub fn in_flight(&self) -> usize {
        self.shared.registry.len()
    }

    fn settle<V, E>(&self, deferred: Deferred<V, E>, outcome: Result<V, E>)
    where
        E: fmt::Display,
    {
        let task_id = deferred.task_id();
        match outcome {
            Ok(value) => {
                self.shared.finish(task_id, TaskStatus::Resolved);
                debug!(task_id = %task_id, "task resolved");
                deferred.resolve(value);
            },
            Err(err) => {
                self.shared.finish(task_id, TaskStatus::Rejected);
                warn!(task_id = %task_id, error = %err, "task rejected");
                deferred.reject(err);
            },
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("stats", &self.shared.stats())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_loop() -> EventLoop {
        EventLoop::new(EngineConfig::default().with_worker_threads(2)).unwrap()
    }

    #[test]
    fn task_ids_are_monotonic() {
        let shared = Shared::new(FileLifecycleLock::new());
        assert_eq!(shared.next_task_id(), TaskId(1));
        assert_eq!(shared.next_task_id(), TaskId(2));
    }

    #[test]
    fn invalid_transition_is_ignored() {
        let shared = Shared::new(FileLifecycleLock::new());
        shared.registry.insert(TaskId(1), TaskStatus::Created);
        shared.transition(TaskId(1), TaskStatus::Resolved);
        assert_eq!(*shared.registry.get(&TaskId(1)).unwrap(), TaskStatus::Created);
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(17_u8)), "non-string panic payload");
    }

    #[test]
    fn submitted_task_is_tracked_until_settled() {
        let event_loop = event_loop();
        event_loop.block_on(|engine| async move {
            let (release, gate) = std::sync::mpsc::channel::<()>();
            let future = engine.submit(
                move |_ctx| {
                    gate.recv().map_err(|e| TaskError::Runtime(e.to_string()))?;
                    Ok::<_, TaskError>(1)
                },
                |_env, n| Ok(n + 1),
            );
            let id = future.task_id();
            assert!(matches!(
                engine.status(id),
                Some(TaskStatus::Queued | TaskStatus::Running)
            ));
            assert_eq!(engine.in_flight(), 1);
            release.send(()).unwrap();
            assert_eq!(future.await, Ok(2));
            assert_eq!(engine.status(id), None);
            assert_eq!(engine.in_flight(), 0);
        });
        assert_eq!(
            event_loop.stats(),
            EngineStats {
                scheduled: 1,
                resolved: 1,
                rejected: 0,
                in_flight: 0
            }
        );
    }

    #[test]
    fn reject_now_does_not_schedule() {
        let event_loop = event_loop();
        let result = event_loop.block_on(|engine| async move {
            engine
                .reject_now::<u8, TaskError>(TaskError::Runtime("bad argument".into()))
                .await
        });
        assert!(result.is_err());
        let stats = event_loop.stats();
        assert_eq!(stats.scheduled, 0);
        assert_eq!(stats.rejected, 1);
    }
}
