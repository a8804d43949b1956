//! Element kinds: the closed set of types an array-file value can hold.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NcError, TypeTag};

/// Element kind of an attribute or variable.
///
/// Discriminants are the library's type codes. A "list of strings" is the
/// [`String`](ElementKind::String) kind with more than one element.
///
/// # Examples
///
/// ```
/// use nc4async::types::ElementKind;
///
/// let kind: ElementKind = "f8".parse().unwrap();
/// assert_eq!(kind, ElementKind::Double);
/// assert_eq!(kind.as_str(), "double");
/// assert_eq!(kind.code(), 6);
/// assert_eq!(kind.size_of(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum ElementKind {
    /// Signed 8-bit integer.
    Byte = 1,
    /// Fixed-length text.
    Char = 2,
    /// Signed 16-bit integer.
    Short = 3,
    /// Signed 32-bit integer.
    Int = 4,
    /// 32-bit float.
    Float = 5,
    /// 64-bit float.
    Double = 6,
    /// Unsigned 8-bit integer.
    UByte = 7,
    /// Unsigned 16-bit integer.
    UShort = 8,
    /// Unsigned 32-bit integer.
    UInt = 9,
    /// Signed 64-bit integer.
    Int64 = 10,
    /// Unsigned 64-bit integer.
    UInt64 = 11,
    /// Variable-length string.
    String = 12,
}

impl ElementKind {
    /// Every supported kind, in type-code order.
    pub const ALL: [ElementKind; 12] = [
        Self::Byte,
        Self::Char,
        Self::Short,
        Self::Int,
        Self::Float,
        Self::Double,
        Self::UByte,
        Self::UShort,
        Self::UInt,
        Self::Int64,
        Self::UInt64,
        Self::String,
    ];

    /// The library type code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Maps a library type code onto a kind.
    ///
    /// # Errors
    ///
    /// Returns [`NcError::UnsupportedType`] for codes outside 1..=12
    /// (compound, opaque, enum and vlen types included).
    pub fn from_code(code: i32) -> Result<Self, NcError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(NcError::UnsupportedType(TypeTag::Code(code)))
    }

    /// Canonical host-facing token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
            Self::UByte => "ubyte",
            Self::UShort => "ushort",
            Self::UInt => "uint",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::String => "string",
        }
    }

    /// Size in bytes of one element. For `String` this is the size of one
    /// string pointer as the library stores it.
    pub fn size_of(self) -> usize {
        match self {
            Self::Byte | Self::Char | Self::UByte => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::Float | Self::UInt => 4,
            Self::Double | Self::Int64 | Self::UInt64 => 8,
            Self::String => std::mem::size_of::<*const u8>(),
        }
    }

    /// `true` for every kind except the two text kinds.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Char | Self::String)
    }

    /// `true` for the 64-bit integer kinds, whose scalars surface as big integers.
    pub fn is_wide_integer(self) -> bool {
        matches!(self, Self::Int64 | Self::UInt64)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = NcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "byte" | "i1" | "b" | "B" => Ok(Self::Byte),
            "char" => Ok(Self::Char),
            "short" | "i2" | "h" | "s" => Ok(Self::Short),
            "int" | "i4" | "i" | "l" => Ok(Self::Int),
            "float" | "f4" | "f" => Ok(Self::Float),
            "double" | "f8" | "d" => Ok(Self::Double),
            "ubyte" | "u1" => Ok(Self::UByte),
            "ushort" | "u2" => Ok(Self::UShort),
            "uint" | "u4" => Ok(Self::UInt),
            "uint64" | "u8" => Ok(Self::UInt64),
            "int64" | "i8" => Ok(Self::Int64),
            "string" | "S1" => Ok(Self::String),
            other => Err(NcError::UnsupportedType(TypeTag::Name(other.to_string()))),
        }
    }
}
