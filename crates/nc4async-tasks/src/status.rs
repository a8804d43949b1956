//! Task lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TaskError, TaskId};

/// Lifecycle status of a submitted task.
///
/// A task progresses through these states according to a fixed state
/// machine. Terminal states (`Resolved`, `Rejected`) reject all transitions.
/// Self-transitions are rejected.
///
/// # State Machine
///
/// ```text
/// Created -> Queued
/// Queued -> Running, Rejected
/// Running -> Completing, Rejected
/// Completing -> Resolved, Rejected
/// Resolved -> (terminal, no transitions)
/// Rejected -> (terminal, no transitions)
/// ```
///
/// `Queued -> Rejected` only happens when the worker pool shuts down before
/// the work started.
///
/// # Examples
///
/// ```
/// use nc4async_tasks::TaskStatus;
///
/// let status = TaskStatus::Running;
/// assert!(!status.is_terminal());
/// assert!(status.can_transition_to(&TaskStatus::Completing));
/// assert!(!status.can_transition_to(&TaskStatus::Resolved)); // must complete first
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has an id but has not been handed to the worker pool.
    Created,
    /// Work is waiting for a worker thread.
    Queued,
    /// Work is running on a worker thread.
    Running,
    /// Work succeeded; the completion closure runs on the event loop.
    Completing,
    /// The future was resolved (terminal).
    Resolved,
    /// The future was rejected (terminal).
    Rejected,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completing => write!(f, "completing"),
            Self::Resolved => write!(f, "resolved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl TaskStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TaskStatus; 6] = [
        Self::Created,
        Self::Queued,
        Self::Running,
        Self::Completing,
        Self::Resolved,
        Self::Rejected,
    ];

    /// Returns `true` if this status is terminal (no further transitions allowed).
    ///
    /// # Examples
    ///
    /// ```
    /// use nc4async_tasks::TaskStatus;
    ///
    /// assert!(!TaskStatus::Queued.is_terminal());
    /// assert!(TaskStatus::Resolved.is_terminal());
    /// assert!(TaskStatus::Rejected.is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }

    /// Returns `true` if transitioning from this status to `next` is valid.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        if self == next {
            return false;
        }

        match self {
            Self::Created => matches!(next, Self::Queued),
            Self::Queued => matches!(next, Self::Running | Self::Rejected),
            Self::Running => matches!(next, Self::Completing | Self::Rejected),
            Self::Completing => matches!(next, Self::Resolved | Self::Rejected),
            Self::Resolved | Self::Rejected => false,
        }
    }

    /// Validates a transition from this status to `next`.
    ///
    /// Returns `Ok(())` if the transition is valid, or a
    /// [`TaskError::InvalidTransition`] describing the rejected transition.
    ///
    /// # Examples
    ///
    /// ```
    /// use nc4async_tasks::{TaskId, TaskStatus};
    ///
    /// assert!(TaskStatus::Completing
    ///     .validate_transition(TaskId(1), &TaskStatus::Resolved)
    ///     .is_ok());
    /// assert!(TaskStatus::Resolved
    ///     .validate_transition(TaskId(1), &TaskStatus::Rejected)
    ///     .is_err());
    /// ```
    pub fn validate_transition(&self, task_id: TaskId, next: &Self) -> Result<(), TaskError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TaskError::InvalidTransition {
                task_id,
                from: *self,
                to: *next,
            })
        }
    }
}
