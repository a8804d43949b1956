//! Error types for array-file operations.
//!
//! Every rejection surfaces as one [`NcError`] whose `Display` is the
//! descriptive message a host caller sees. Library failures carry the
//! library's own status string under the `NetCDF4:` tag.

use std::fmt;

use nc4async_tasks::TaskError;
use thiserror::Error;

use crate::library::Status;
use crate::types::ElementKind;

/// A type tag that could not be mapped onto a supported element kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    /// Numeric type code as stored by the library.
    Code(i32),
    /// Host-facing type token.
    Name(String),
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "type code {code}"),
            Self::Name(name) => write!(f, "type \"{name}\""),
        }
    }
}

/// Errors produced by array-file operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NcError {
    /// An element kind outside the supported set was encountered.
    #[error("NetCDF4: Variable type not supported yet ({0})")]
    UnsupportedType(TypeTag),

    /// A host value does not have the shape the requested kind needs.
    #[error("NetCDF4: Need either value or typed array (expected {kind}, found {found})")]
    TypeMismatch {
        /// The element kind that was requested.
        kind: ElementKind,
        /// Description of the host value that was supplied.
        found: String,
    },

    /// The external library returned a non-success status.
    #[error("NetCDF4: {message}")]
    Library {
        /// Raw status code.
        status: Status,
        /// The library's human-readable status string.
        message: String,
    },

    /// Arguments at the public operation boundary were malformed.
    #[error("{0}")]
    Argument(String),

    /// The file handle was already closed.
    #[error("File already closed")]
    FileClosed {
        /// Path of the closed file.
        path: String,
    },

    /// The task engine failed independently of the operation.
    #[error(transparent)]
    Task(#[from] TaskError),
}

impl NcError {
    /// Builds an argument error carrying the `NetCDF4:` tag.
    pub fn argument(message: impl fmt::Display) -> Self {
        Self::Argument(format!("NetCDF4: {message}"))
    }
}

impl From<Status> for NcError {
    fn from(status: Status) -> Self {
        Self::Library {
            status,
            message: status.message().to_string(),
        }
    }
}

/// Result alias for array-file operations.
pub type Result<T> = std::result::Result<T, NcError>;
