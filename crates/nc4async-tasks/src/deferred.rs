//! Deferred/future pair used to settle a task exactly once.
//!
//! [`channel`] returns a [`Deferred`], kept by the engine, and a
//! [`TaskFuture`], handed to the caller. `resolve` and `reject` take the
//! deferred by value, so a second settlement does not type-check. Dropping a
//! deferred without settling it makes the future yield
//! [`TaskError::Abandoned`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{TaskError, TaskId};

/// Creates a connected deferred/future pair for `task_id`.
pub fn channel<V, E>(task_id: TaskId) -> (Deferred<V, E>, TaskFuture<V, E>) {
    let (tx, rx) = oneshot::channel();
    (
        Deferred { task_id, tx },
        TaskFuture {
            task_id,
            state: State::Pending(rx),
        },
    )
}

/// The settling side of a task.
pub struct Deferred<V, E> {
    task_id: TaskId,
    tx: oneshot::Sender<Result<V, E>>,
}

impl<V, E> Deferred<V, E> {
    /// The task this deferred settles.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Resolves the future with `value`.
    pub fn resolve(self, value: V) {
        self.settle(Ok(value));
    }

    /// Rejects the future with `error`.
    pub fn reject(self, error: E) {
        self.settle(Err(error));
    }

    /// Settles the future with `outcome`.
    ///
    /// If the caller already dropped its future the outcome is discarded.
    pub fn settle(self, outcome: Result<V, E>) {
        if self.tx.send(outcome).is_err() {
            tracing::trace!(task_id = %self.task_id, "future dropped before settlement");
        }
    }
}

impl<V, E> fmt::Debug for Deferred<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("task_id", &self.task_id)
            .finish_non_exhaustive()
    }
}

enum State<V, E> {
    Pending(oneshot::Receiver<Result<V, E>>),
    Ready(Option<Result<V, E>>),
}

/// The caller-visible handle of a task.
///
/// Resolves to the value produced by the task's completion closure, or
/// rejects with the task's error.
#[must_use = "a task future does nothing unless awaited or dropped deliberately"]
pub struct TaskFuture<V, E> {
    task_id: TaskId,
    state: State<V, E>,
}

// The state is never structurally pinned.
impl<V, E> Unpin for TaskFuture<V, E> {}

impl<V, E> TaskFuture<V, E> {
    /// A future that is already settled with `outcome`.
    pub fn settled(task_id: TaskId, outcome: Result<V, E>) -> Self {
        Self {
            task_id,
            state: State::Ready(Some(outcome)),
        }
    }

    /// The task this future belongs to.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }
}

impl<V, E> Future for TaskFuture<V, E>
where
    E: From<TaskError>,
{
    type Output = Result<V, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let task_id = this.task_id;
        let abandoned = move || -> Result<V, E> { Err(TaskError::Abandoned { task_id }.into()) };
        match &mut this.state {
            State::Pending(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => {
                    this.state = State::Ready(None);
                    Poll::Ready(outcome)
                },
                Poll::Ready(Err(_)) => {
                    this.state = State::Ready(None);
                    Poll::Ready(abandoned())
                },
                Poll::Pending => Poll::Pending,
            },
            State::Ready(slot) => Poll::Ready(slot.take().unwrap_or_else(abandoned)),
        }
    }
}

impl<V, E> fmt::Debug for TaskFuture<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Pending(_) => "pending",
            State::Ready(Some(_)) => "settled",
            State::Ready(None) => "taken",
        };
        f.debug_struct("TaskFuture")
            .field("task_id", &self.task_id)
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_reaches_future() {
        let (deferred, future) = channel::<u32, TaskError>(TaskId(1));
        deferred.resolve(5);
        assert_eq!(future.await, Ok(5));
    }

    #[tokio::test]
    async fn reject_reaches_future() {
        let (deferred, future) = channel::<u32, TaskError>(TaskId(2));
        deferred.reject(TaskError::Runtime("nope".into()));
        assert_eq!(future.await, Err(TaskError::Runtime("nope".into())));
    }

    #[tokio::test]
    async fn dropped_deferred_abandons_future() {
        let (deferred, future) = channel::<u32, TaskError>(TaskId(3));
        drop(deferred);
        assert_eq!(future.await, Err(TaskError::Abandoned { task_id: TaskId(3) }));
    }

    #[tokio::test]
    async fn settled_future_is_ready() {
        let future = TaskFuture::<u32, TaskError>::settled(TaskId(4), Ok(9));
        assert_eq!(future.task_id(), TaskId(4));
        assert_eq!(future.await, Ok(9));
    }

    #[test]
    fn settling_after_future_dropped_is_silent() {
        let (deferred, future) = channel::<u32, TaskError>(TaskId(5));
        drop(future);
        deferred.resolve(1);
    }
}
