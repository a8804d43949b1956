//! One-shot task engine for bindings that expose blocking native libraries
//! to a single-threaded host runtime.
//!
//! A task pairs a blocking `work` closure, which runs on a bounded worker
//! pool, with an `on_complete` closure, which runs on the event-loop thread
//! and turns the work result into a host-visible value. The caller gets a
//! [`TaskFuture`] back immediately; it settles exactly once.
//!
//! # Overview
//!
//! A task progresses through a state machine
//! (`created` -> `queued` -> `running` -> `completing` -> `resolved`, with
//! `rejected` reachable from `queued`, `running` and `completing`). Settlement
//! goes through a [`Deferred`] whose `resolve`/`reject` consume it, so a
//! future can never be settled twice.
//!
//! # Module Organization
//!
//! - [`engine`] - Event loop, task submission and statistics
//! - [`deferred`] - Deferred/future pair used for settlement
//! - [`status`] - Task lifecycle state machine
//! - [`lock`] - Shared/exclusive lock guarding file-handle lifecycles
//! - [`config`] - Worker pool configuration
//! - [`error`] - Engine error type
//!
//! # Examples
//!
//! ```
//! use nc4async_tasks::{EngineConfig, EventLoop, TaskError};
//!
//! let event_loop = EventLoop::new(EngineConfig::default()).unwrap();
//! let answer = event_loop.block_on(|engine| async move {
//!     engine
//!         .submit(
//!             |_ctx| Ok::<_, TaskError>(6 * 7),
//!             |_env, n| Ok(format!("answer: {n}")),
//!         )
//!         .await
//! });
//! assert_eq!(answer.unwrap(), "answer: 42");
//! ```

pub mod config;
pub mod deferred;
pub mod engine;
pub mod error;
pub mod lock;
pub mod status;

// Re-exports for ergonomic access
pub use config::EngineConfig;
pub use deferred::{Deferred, TaskFuture};
pub use engine::{Engine, EngineStats, EventLoop, HostEnv, WorkerContext};
pub use error::{TaskError, TaskId};
pub use lock::FileLifecycleLock;
pub use status::TaskStatus;
