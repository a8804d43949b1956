//! The typed-value model: element kinds, typed values and host values.

pub mod host;
pub mod item;
pub mod kind;

pub use host::{HostObject, HostValue, TypedArray};
pub use item::{Buffer, Elements, Text, TypedValue};
pub use kind::ElementKind;
