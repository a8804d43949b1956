//! Worker pool configuration.

use serde::{Deserialize, Serialize};

/// Configuration for an [`EventLoop`](crate::EventLoop).
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `worker_threads` | 4 |
/// | `thread_name` | `"nc4async-worker"` |
/// | `keep_alive_ms` | 10000 |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on worker threads running blocking work. Values below 1
    /// are treated as 1.
    pub worker_threads: usize,

    /// Name given to worker threads.
    pub thread_name: String,

    /// How long an idle worker thread is kept before it exits.
    pub keep_alive_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            thread_name: "nc4async-worker".to_string(),
            keep_alive_ms: 10_000,
        }
    }
}

impl EngineConfig {
    /// Sets the worker thread bound.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Sets the worker thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// The worker bound actually applied.
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads.max(1)
    }
}
