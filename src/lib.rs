//! # nc4async
//!
//! Asynchronous bindings for a NetCDF-style array-file library, written for
//! a single-threaded host runtime.
//!
//! Every operation hands a blocking library call to a worker pool and
//! returns a future immediately. The result is turned into a host value on
//! the event-loop thread, which is the only thread allowed to build one.
//!
//! # Module Organization
//!
//! - [`types`] - Element kinds, typed values and host values
//! - [`attribute`] - List, add, rename and delete attributes
//! - [`file`], [`group`], [`variable`] - Handle objects for the host
//! - [`entity`] - Plain records passed from worker to event loop
//! - [`library`] - The blocking library surface and an in-memory implementation
//! - [`config`] - TOML and environment configuration
//! - [`logging`] - Log subscriber installation (feature `logging`)
//! - [`error`] - Error type
//!
//! The task engine itself lives in the `nc4async-tasks` crate; its main
//! types are re-exported here.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use nc4async::library::MemoryLibrary;
//! use nc4async::types::HostValue;
//! use nc4async::{EngineConfig, EventLoop, NcError};
//!
//! let event_loop = EventLoop::new(EngineConfig::default()).unwrap();
//! let library = Arc::new(MemoryLibrary::new());
//!
//! let listed = event_loop.block_on(|engine| async move {
//!     let file = nc4async::open(&engine, library, "ocean.nc", "c", None).await?;
//!     let root = file.root();
//!     root.add_attribute("rank", "int", &HostValue::from(42)).await?;
//!     let attributes = root.attributes(true).await?;
//!     file.close().await?;
//!     Ok::<_, NcError>(attributes)
//! });
//!
//! let json = serde_json::to_string(&listed.unwrap()).unwrap();
//! assert_eq!(json, r#"{"rank":{"type":"int","value":42}}"#);
//! ```

pub mod attribute;
pub mod config;
pub mod entity;
pub mod error;
pub mod file;
pub mod group;
pub mod library;
#[cfg(feature = "logging")]
pub mod logging;
pub mod types;
pub mod variable;

// Re-exports for ergonomic access
pub use config::{Config, ConfigError, LogFormat, LoggingConfig};
pub use error::{NcError, Result, TypeTag};
pub use file::{open, File, OpenMode};
pub use group::Group;
pub use library::{MemoryLibrary, NcLibrary, Status};
pub use types::{ElementKind, HostObject, HostValue, TypedArray, TypedValue};
pub use variable::Variable;

pub use nc4async_tasks::{
    Engine, EngineConfig, EngineStats, EventLoop, FileLifecycleLock, HostEnv, TaskError, TaskFuture, TaskId,
    TaskStatus,
};
