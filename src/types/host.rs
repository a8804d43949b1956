//! Host dynamic values.
//!
//! The host runtime's value universe as seen from the binding: numbers,
//! big integers, strings, typed arrays, plain arrays and key/value objects.
//! Typed arrays own their backing store through an `Arc<[T]>`, so a native
//! buffer can alias one without copying.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Largest integer a host number represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A host dynamic value.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// `undefined`.
    Undefined,
    /// `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A double-precision number.
    Number(f64),
    /// An arbitrary-precision integer; wide enough for every 64-bit value.
    BigInt(i128),
    /// A string.
    String(String),
    /// A typed array.
    TypedArray(TypedArray),
    /// A plain array.
    Array(Vec<HostValue>),
    /// A plain object.
    Object(HostObject),
}

impl HostValue {
    /// Short description of the value's shape, used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::BigInt(_) => "bigint",
            Self::String(_) => "string",
            Self::TypedArray(array) => array.type_name(),
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// The string, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The object, if this is an object.
    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The typed array, if this is a typed array.
    pub fn as_typed_array(&self) -> Option<&TypedArray> {
        match self {
            Self::TypedArray(array) => Some(array),
            _ => None,
        }
    }

    /// Number coercion for numbers and big integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::BigInt(n) => Some(*n as f64),
            _ => None,
        }
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for HostValue {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<TypedArray> for HostValue {
    fn from(array: TypedArray) -> Self {
        Self::TypedArray(array)
    }
}

impl From<HostObject> for HostValue {
    fn from(object: HostObject) -> Self {
        Self::Object(object)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl Serialize for HostValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined | Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => serialize_number(*n, serializer),
            Self::BigInt(n) => {
                if let Ok(n) = i64::try_from(*n) {
                    serializer.serialize_i64(n)
                } else if let Ok(n) = u64::try_from(*n) {
                    serializer.serialize_u64(n)
                } else {
                    serializer.serialize_str(&n.to_string())
                }
            },
            Self::String(s) => serializer.serialize_str(s),
            Self::TypedArray(array) => array.serialize(serializer),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            },
            Self::Object(object) => object.serialize(serializer),
        }
    }
}

// Integral numbers serialize as integers, the way the host prints them.
fn serialize_number<S: Serializer>(n: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(n as i64)
    } else {
        serializer.serialize_f64(n)
    }
}

/// A host typed array. Each variant owns its backing store.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    /// `Int8Array`.
    Int8(Arc<[i8]>),
    /// `Uint8Array`.
    Uint8(Arc<[u8]>),
    /// `Int16Array`.
    Int16(Arc<[i16]>),
    /// `Uint16Array`.
    Uint16(Arc<[u16]>),
    /// `Int32Array`.
    Int32(Arc<[i32]>),
    /// `Uint32Array`.
    Uint32(Arc<[u32]>),
    /// `Float32Array`.
    Float32(Arc<[f32]>),
    /// `Float64Array`.
    Float64(Arc<[f64]>),
    /// `BigInt64Array`.
    BigInt64(Arc<[i64]>),
    /// `BigUint64Array`.
    BigUint64(Arc<[u64]>),
}

macro_rules! typed_array_dispatch {
    ($array:expr, $values:ident => $body:expr) => {
        match $array {
            TypedArray::Int8($values) => $body,
            TypedArray::Uint8($values) => $body,
            TypedArray::Int16($values) => $body,
            TypedArray::Uint16($values) => $body,
            TypedArray::Int32($values) => $body,
            TypedArray::Uint32($values) => $body,
            TypedArray::Float32($values) => $body,
            TypedArray::Float64($values) => $body,
            TypedArray::BigInt64($values) => $body,
            TypedArray::BigUint64($values) => $body,
        }
    };
}

impl TypedArray {
    /// Number of elements.
    pub fn len(&self) -> usize {
        typed_array_dispatch!(self, values => values.len())
    }

    /// `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The host constructor name, e.g. `Float64Array`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int8(_) => "Int8Array",
            Self::Uint8(_) => "Uint8Array",
            Self::Int16(_) => "Int16Array",
            Self::Uint16(_) => "Uint16Array",
            Self::Int32(_) => "Int32Array",
            Self::Uint32(_) => "Uint32Array",
            Self::Float32(_) => "Float32Array",
            Self::Float64(_) => "Float64Array",
            Self::BigInt64(_) => "BigInt64Array",
            Self::BigUint64(_) => "BigUint64Array",
        }
    }

    /// Element `index` as a host value.
    pub fn get(&self, index: usize) -> Option<HostValue> {
        match self {
            Self::BigInt64(values) => values.get(index).map(|v| HostValue::BigInt(i128::from(*v))),
            Self::BigUint64(values) => values.get(index).map(|v| HostValue::BigInt(i128::from(*v))),
            Self::Int8(values) => values.get(index).map(|v| HostValue::Number(f64::from(*v))),
            Self::Uint8(values) => values.get(index).map(|v| HostValue::Number(f64::from(*v))),
            Self::Int16(values) => values.get(index).map(|v| HostValue::Number(f64::from(*v))),
            Self::Uint16(values) => values.get(index).map(|v| HostValue::Number(f64::from(*v))),
            Self::Int32(values) => values.get(index).map(|v| HostValue::Number(f64::from(*v))),
            Self::Uint32(values) => values.get(index).map(|v| HostValue::Number(f64::from(*v))),
            Self::Float32(values) => values.get(index).map(|v| HostValue::Number(f64::from(*v))),
            Self::Float64(values) => values.get(index).map(|v| HostValue::Number(*v)),
        }
    }

    /// Elements converted to host values.
    pub fn to_values(&self) -> Vec<HostValue> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }
}

impl Serialize for TypedArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for value in self.to_values() {
            seq.serialize_element(&value)?;
        }
        seq.end()
    }
}

macro_rules! typed_array_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for TypedArray {
                fn from(values: Vec<$ty>) -> Self {
                    Self::$variant(values.into())
                }
            }
        )*
    };
}

typed_array_from_vec!(
    i8 => Int8,
    u8 => Uint8,
    i16 => Int16,
    u16 => Uint16,
    i32 => Int32,
    u32 => Uint32,
    f32 => Float32,
    f64 => Float64,
    i64 => BigInt64,
    u64 => BigUint64,
);

/// A plain host object. Keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostObject {
    entries: IndexMap<String, HostValue>,
}

impl HostObject {
    /// An empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, keeping its original position if it already existed.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<HostValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Value at `key`.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.entries.get(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, HostValue)> for HostObject {
    fn from_iter<I: IntoIterator<Item = (String, HostValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for HostObject {
    type Item = (String, HostValue);
    type IntoIter = indexmap::map::IntoIter<String, HostValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for HostObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
