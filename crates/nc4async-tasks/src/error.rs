//! Error types for task engine operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::TaskStatus;

/// Identifier assigned to every submitted task.
///
/// Ids are allocated from a per-engine monotonic counter and are never
/// reused for the lifetime of an [`EventLoop`](crate::EventLoop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Errors raised by the engine itself, independent of what a task's work does.
///
/// Caller error types must implement `From<TaskError>` so that engine-level
/// failures (a panicking worker, an abandoned task) can reject a future typed
/// over the caller's own error.
///
/// # Examples
///
/// ```
/// use nc4async_tasks::{TaskError, TaskId};
///
/// let err = TaskError::Abandoned { task_id: TaskId(7) };
/// assert!(err.to_string().contains("task-7"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The work closure panicked on its worker thread.
    #[error("worker panicked while running {task_id}: {message}")]
    WorkerPanicked {
        /// The task whose work panicked.
        task_id: TaskId,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// The completion closure panicked on the event-loop thread.
    #[error("completion panicked while settling {task_id}: {message}")]
    CompletionPanicked {
        /// The task whose completion panicked.
        task_id: TaskId,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// The task was dropped before it settled, e.g. the event loop shut down.
    #[error("{task_id} was dropped before it settled")]
    Abandoned {
        /// The abandoned task.
        task_id: TaskId,
    },

    /// Attempted an invalid state machine transition.
    #[error("invalid transition from {from} to {to} for {task_id}")]
    InvalidTransition {
        /// The task that was being transitioned.
        task_id: TaskId,
        /// The current status of the task.
        from: TaskStatus,
        /// The target status that was rejected.
        to: TaskStatus,
    },

    /// The event loop runtime could not be built.
    #[error("failed to start event loop: {0}")]
    Runtime(String),
}

impl TaskError {
    /// Returns the task this error refers to, if any.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::WorkerPanicked { task_id, .. }
            | Self::CompletionPanicked { task_id, .. }
            | Self::Abandoned { task_id }
            | Self::InvalidTransition { task_id, .. } => Some(*task_id),
            Self::Runtime(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_task_id() {
        let err = TaskError::WorkerPanicked {
            task_id: TaskId(3),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "worker panicked while running task-3: boom");
        assert_eq!(err.task_id(), Some(TaskId(3)));
    }

    #[test]
    fn runtime_error_has_no_task() {
        let err = TaskError::Runtime("no threads".into());
        assert_eq!(err.task_id(), None);
        assert_eq!(err.to_string(), "failed to start event loop: no threads");
    }

    #[test]
    fn task_id_serializes_as_number() {
        let json = serde_json::to_string(&TaskId(12)).unwrap();
        assert_eq!(json, "12");
    }
}
