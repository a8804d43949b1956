//! Typed values: one tagged, owned buffer per element kind.
//!
//! A [`TypedValue`] is a name plus a [`Buffer`]. The buffer's variant *is*
//! the element kind and its element count *is* the length, so the tag and
//! the active buffer can never disagree.
//!
//! Conversion is asymmetric on purpose:
//!
//! - native -> host ([`TypedValue::to_host_value`]) copies the elements into
//!   a fresh host allocation and then drops the native buffer;
//! - host -> native ([`TypedValue::from_host_value`]) aliases a typed
//!   array's backing store ([`Elements::Shared`]) instead of copying it.

use std::sync::Arc;

use nc4async_tasks::HostEnv;

use crate::error::{NcError, Result};
use crate::types::host::{HostValue, TypedArray};
use crate::types::kind::ElementKind;

/// Elements of one numeric kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Elements<T> {
    /// Natively allocated.
    Owned(Vec<T>),
    /// Aliases a host typed array's backing store.
    Shared(Arc<[T]>),
}

impl<T> Elements<T> {
    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::Owned(values) => values,
            Self::Shared(values) => values,
        }
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// `true` if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// `true` if the elements alias host memory.
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }
}

impl<T: Clone> Elements<T> {
    /// Mutable access. Shared elements are first copied into an owned buffer
    /// so host memory is never written through.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if let Self::Shared(values) = self {
            *self = Self::Owned(values.to_vec());
        }
        if let Self::Owned(values) = self {
            return values;
        }
        &mut []
    }

    /// Consumes the elements into a vector.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Owned(values) => values,
            Self::Shared(values) => values.to_vec(),
        }
    }
}

impl<T> From<Vec<T>> for Elements<T> {
    fn from(values: Vec<T>) -> Self {
        Self::Owned(values)
    }
}

/// Fixed-length text. Always stored with a trailing NUL byte, so a text of
/// length `n` occupies `n + 1` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    bytes: Vec<u8>,
}

impl Text {
    /// `len` zero bytes plus the terminator.
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0; len + 1],
        }
    }

    /// Text holding `bytes` followed by the terminator.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let mut bytes = bytes.into();
        bytes.push(0);
        Self { bytes }
    }

    /// Characters, without the terminator.
    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    /// `true` if there are no characters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The characters, without the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// Writable characters, without the terminator.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len();
        &mut self.bytes[..len]
    }

    /// The characters followed by the terminator.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes
    }

    /// Host string view: characters up to the first NUL, lossily decoded.
    pub fn to_string_lossy(&self) -> String {
        let end = self.bytes.iter().position(|b| *b == 0).unwrap_or(self.len());
        String::from_utf8_lossy(&self.bytes[..end]).into_owned()
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

/// The active buffer of a typed value; one variant per element kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    /// `byte` elements.
    Byte(Elements<i8>),
    /// `char` text.
    Char(Text),
    /// `short` elements.
    Short(Elements<i16>),
    /// `int` elements.
    Int(Elements<i32>),
    /// `float` elements.
    Float(Elements<f32>),
    /// `double` elements.
    Double(Elements<f64>),
    /// `ubyte` elements.
    UByte(Elements<u8>),
    /// `ushort` elements.
    UShort(Elements<u16>),
    /// `uint` elements.
    UInt(Elements<u32>),
    /// `int64` elements.
    Int64(Elements<i64>),
    /// `uint64` elements.
    UInt64(Elements<u64>),
    /// `string` elements; each string is owned by the list.
    String(Vec<String>),
}

/// Runs `$numeric` for every numeric variant with `$elems` bound to the
/// elements, `$char` for text and `$string` for strings.
macro_rules! dispatch {
    ($buffer:expr; $elems:ident => $numeric:expr; $text:ident => $char:expr; $strings:ident => $string:expr $(;)?) => {
        match $buffer {
            Buffer::Byte($elems) => $numeric,
            Buffer::Short($elems) => $numeric,
            Buffer::Int($elems) => $numeric,
            Buffer::Float($elems) => $numeric,
            Buffer::Double($elems) => $numeric,
            Buffer::UByte($elems) => $numeric,
            Buffer::UShort($elems) => $numeric,
            Buffer::UInt($elems) => $numeric,
            Buffer::Int64($elems) => $numeric,
            Buffer::UInt64($elems) => $numeric,
            Buffer::Char($text) => $char,
            Buffer::String($strings) => $string,
        }
    };
}

/// Same as `dispatch!`, but rebuilds a buffer of the same variant from the
/// numeric arm's result.
macro_rules! map_buffer {
    ($buffer:expr; $elems:ident => $numeric:expr; $text:ident => $char:expr; $strings:ident => $string:expr $(;)?) => {
        match $buffer {
            Buffer::Byte($elems) => Buffer::Byte($numeric),
            Buffer::Short($elems) => Buffer::Short($numeric),
            Buffer::Int($elems) => Buffer::Int($numeric),
            Buffer::Float($elems) => Buffer::Float($numeric),
            Buffer::Double($elems) => Buffer::Double($numeric),
            Buffer::UByte($elems) => Buffer::UByte($numeric),
            Buffer::UShort($elems) => Buffer::UShort($numeric),
            Buffer::UInt($elems) => Buffer::UInt($numeric),
            Buffer::Int64($elems) => Buffer::Int64($numeric),
            Buffer::UInt64($elems) => Buffer::UInt64($numeric),
            Buffer::Char($text) => Buffer::Char($char),
            Buffer::String($strings) => Buffer::String($string),
        }
    };
}

impl Buffer {
    /// A zero-initialized buffer of `len` elements of `kind`.
    pub fn allocate(kind: ElementKind, len: usize) -> Self {
        match kind {
            ElementKind::Byte => Self::Byte(zeroed(len)),
            ElementKind::Char => Self::Char(Text::zeroed(len)),
            ElementKind::Short => Self::Short(zeroed(len)),
            ElementKind::Int => Self::Int(zeroed(len)),
            ElementKind::Float => Self::Float(zeroed(len)),
            ElementKind::Double => Self::Double(zeroed(len)),
            ElementKind::UByte => Self::UByte(zeroed(len)),
            ElementKind::UShort => Self::UShort(zeroed(len)),
            ElementKind::UInt => Self::UInt(zeroed(len)),
            ElementKind::Int64 => Self::Int64(zeroed(len)),
            ElementKind::UInt64 => Self::UInt64(zeroed(len)),
            ElementKind::String => Self::String(vec![String::new(); len]),
        }
    }

    /// The element kind of the active variant.
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Byte(_) => ElementKind::Byte,
            Self::Char(_) => ElementKind::Char,
            Self::Short(_) => ElementKind::Short,
            Self::Int(_) => ElementKind::Int,
            Self::Float(_) => ElementKind::Float,
            Self::Double(_) => ElementKind::Double,
            Self::UByte(_) => ElementKind::UByte,
            Self::UShort(_) => ElementKind::UShort,
            Self::UInt(_) => ElementKind::UInt,
            Self::Int64(_) => ElementKind::Int64,
            Self::UInt64(_) => ElementKind::UInt64,
            Self::String(_) => ElementKind::String,
        }
    }

    /// Element count.
    pub fn len(&self) -> usize {
        dispatch!(self;
            elems => elems.len();
            text => text.len();
            strings => strings.len())
    }

    /// `true` if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes occupied by the active buffer: `len * size_of(kind)`, or
    /// `len + 1` for text.
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Char(text) => text.as_bytes_with_nul().len(),
            other => other.len() * other.kind().size_of(),
        }
    }

    /// `true` if the elements alias host memory.
    pub fn is_shared(&self) -> bool {
        dispatch!(self;
            elems => elems.is_shared();
            _text => false;
            _strings => false)
    }

    /// An owned copy that no longer aliases host memory.
    pub(crate) fn detached(&self) -> Self {
        map_buffer!(self;
            elems => Elements::Owned(elems.as_slice().to_vec());
            text => text.clone();
            strings => strings.clone())
    }

    /// Elements at `indices`, in order, as a new owned buffer.
    pub(crate) fn gather(&self, indices: &[usize]) -> Option<Self> {
        fn pick<T: Clone>(values: &[T], indices: &[usize]) -> Option<Vec<T>> {
            indices.iter().map(|&i| values.get(i).cloned()).collect()
        }
        Some(map_buffer!(self;
            elems => Elements::Owned(pick(elems.as_slice(), indices)?);
            text => Text::from_bytes(pick(text.as_bytes(), indices)?);
            strings => pick(strings, indices)?))
    }

    /// Writes `source`'s elements to `indices`, in order. Returns `None` if
    /// the kinds differ or an index is out of range.
    pub(crate) fn scatter(&mut self, indices: &[usize], source: &Self) -> Option<()> {
        fn put<T: Clone>(target: &mut [T], indices: &[usize], source: &[T]) -> Option<()> {
            if indices.len() != source.len() {
                return None;
            }
            for (&i, value) in indices.iter().zip(source) {
                *target.get_mut(i)? = value.clone();
            }
            Some(())
        }
        match (self, source) {
            (Self::Byte(t), Self::Byte(s)) => put(t.as_mut_slice(), indices, s.as_slice()),
            (Self::Short(t), Self::Short(s)) => put(t.as_mut_slice(), indices, s.as_slice()),
            (Self::Int(t), Self::Int(s)) => put(t.as_mut_slice(), indices, s.as_slice()),
            (Self::Float(t), Self::Float(s)) => put(t.as_mut_slice(), indices, s.as_slice()),
            (Self::Double(t), Self::Double(s)) => put(t.as_mut_slice(), indices, s.as_slice()),
            (Self::UByte(t), Self::UByte(s)) => put(t.as_mut_slice(), indices, s.as_slice()),
            (Self::UShort(t), Self::UShort(s)) => put(t.as_mut_slice(), indices, s.as_slice()),
            (Self::UInt(t), Self::UInt(s)) => put(t.as_mut_slice(), indices, s.as_slice()),
            (Self::Int64(t), Self::Int64(s)) => put(t.as_mut_slice(), indices, s.as_slice()),
            (Self::UInt64(t), Self::UInt64(s)) => put(t.as_mut_slice(), indices, s.as_slice()),
            (Self::Char(t), Self::Char(s)) => put(t.as_bytes_mut(), indices, s.as_bytes()),
            (Self::String(t), Self::String(s)) => put(t, indices, s),
            _ => None,
        }
    }
}

fn zeroed<T: Clone + Default>(len: usize) -> Elements<T> {
    Elements::Owned(vec![T::default(); len])
}

/// A numeric element type and its host-side representations.
trait Element: Copy + Send + Sync + 'static {
    fn from_number(n: f64) -> Self;
    fn from_big_int(n: i128) -> Self;
    fn to_scalar(self) -> HostValue;
    fn to_typed_array(values: Arc<[Self]>) -> TypedArray;
    fn backing(array: &TypedArray) -> Option<&Arc<[Self]>>;
}

/// Truncates toward zero and reduces modulo 2^32; non-finite numbers are 0.
fn wrap_u32(n: f64) -> u32 {
    if n.is_finite() {
        n.trunc().rem_euclid(4_294_967_296.0) as u32
    } else {
        0
    }
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident, $narrow:expr, $scalar:expr);* $(;)?) => {
        $(
            impl Element for $ty {
                fn from_number(n: f64) -> Self {
                    let narrow: fn(f64) -> $ty = $narrow;
                    narrow(n)
                }

                fn from_big_int(n: i128) -> Self {
                    n as $ty
                }

                fn to_scalar(self) -> HostValue {
                    let to_host: fn($ty) -> HostValue = $scalar;
                    to_host(self)
                }

                fn to_typed_array(values: Arc<[Self]>) -> TypedArray {
                    TypedArray::$variant(values)
                }

                fn backing(array: &TypedArray) -> Option<&Arc<[Self]>> {
                    match array {
                        TypedArray::$variant(values) => Some(values),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_element! {
    i8 => Int8, |n| wrap_u32(n) as i8, |v| HostValue::Number(f64::from(v));
    i16 => Int16, |n| wrap_u32(n) as i16, |v| HostValue::Number(f64::from(v));
    i32 => Int32, |n| wrap_u32(n) as i32, |v| HostValue::Number(f64::from(v));
    f32 => Float32, |n| n as f32, |v| HostValue::Number(f64::from(v));
    f64 => Float64, |n| n, HostValue::Number;
    u8 => Uint8, |n| wrap_u32(n) as u8, |v| HostValue::Number(f64::from(v));
    u16 => Uint16, |n| wrap_u32(n) as u16, |v| HostValue::Number(f64::from(v));
    u32 => Uint32, wrap_u32, |v| HostValue::Number(f64::from(v));
    i64 => BigInt64, |n| n as i64, |v| HostValue::BigInt(i128::from(v));
    u64 => BigUint64, |n| n as u64, |v| HostValue::BigInt(i128::from(v));
}

fn numeric_from_host<T: Element>(value: &HostValue) -> Option<Elements<T>> {
    match value {
        HostValue::Number(n) => Some(Elements::Owned(vec![T::from_number(*n)])),
        HostValue::BigInt(n) => Some(Elements::Owned(vec![T::from_big_int(*n)])),
        HostValue::TypedArray(array) => T::backing(array).map(|values| Elements::Shared(Arc::clone(values))),
        _ => None,
    }
}

fn numeric_to_host<T: Element>(elements: Elements<T>) -> HostValue {
    let values = elements.as_slice();
    if values.len() == 1 {
        values[0].to_scalar()
    } else {
        HostValue::TypedArray(T::to_typed_array(Arc::from(values)))
    }
}

fn strings_from_host(value: &HostValue) -> Option<Vec<String>> {
    match value {
        HostValue::String(s) => Some(vec![s.clone()]),
        HostValue::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_owned))
            .collect(),
        _ => None,
    }
}

/// A named, tagged value with its own buffer.
///
/// # Examples
///
/// ```
/// use nc4async::types::{ElementKind, TypedValue};
///
/// let value = TypedValue::allocate(ElementKind::Char, 5);
/// assert_eq!(value.kind(), ElementKind::Char);
/// assert_eq!(value.len(), 5);
/// assert_eq!(value.byte_size(), 6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    name: String,
    buffer: Buffer,
}

impl TypedValue {
    /// A value named `name` holding `buffer`.
    pub fn new(name: impl Into<String>, buffer: Buffer) -> Self {
        Self {
            name: name.into(),
            buffer,
        }
    }

    /// An anonymous, zero-initialized value of `len` elements of `kind`.
    pub fn allocate(kind: ElementKind, len: usize) -> Self {
        Self::new(String::new(), Buffer::allocate(kind, len))
    }

    /// [`allocate`](Self::allocate) from a library type code.
    ///
    /// # Errors
    ///
    /// Returns [`NcError::UnsupportedType`] for codes outside the supported
    /// set; nothing is allocated in that case.
    pub fn allocate_code(type_code: i32, len: usize) -> Result<Self> {
        let kind = ElementKind::from_code(type_code)?;
        Ok(Self::allocate(kind, len))
    }

    /// Converts a host value into a value of `kind`.
    ///
    /// Numbers and big integers become one-element values. Typed arrays must
    /// match `kind`'s element type and are aliased, not copied. `char`
    /// accepts a string; `string` accepts a string or an array of strings.
    ///
    /// Numbers stored into 8, 16 and 32-bit integer kinds are truncated and
    /// wrap modulo 2^32 before narrowing, so `300` stored as `byte` is `44`
    /// and `-1` stored as `uint` is `4294967295`. NaN and infinities become
    /// 0. The 64-bit kinds use a saturating cast; big integers always wrap.
    ///
    /// # Errors
    ///
    /// Returns [`NcError::TypeMismatch`] if `value` has another shape.
    pub fn from_host_value(name: impl Into<String>, kind: ElementKind, value: &HostValue) -> Result<Self> {
        let buffer = match kind {
            ElementKind::Byte => numeric_from_host(value).map(Buffer::Byte),
            ElementKind::Short => numeric_from_host(value).map(Buffer::Short),
            ElementKind::Int => numeric_from_host(value).map(Buffer::Int),
            ElementKind::Float => numeric_from_host(value).map(Buffer::Float),
            ElementKind::Double => numeric_from_host(value).map(Buffer::Double),
            ElementKind::UByte => numeric_from_host(value).map(Buffer::UByte),
            ElementKind::UShort => numeric_from_host(value).map(Buffer::UShort),
            ElementKind::UInt => numeric_from_host(value).map(Buffer::UInt),
            ElementKind::Int64 => numeric_from_host(value).map(Buffer::Int64),
            ElementKind::UInt64 => numeric_from_host(value).map(Buffer::UInt64),
            ElementKind::Char => value.as_str().map(|s| Buffer::Char(Text::from(s))),
            ElementKind::String => strings_from_host(value).map(Buffer::String),
        };
        buffer
            .map(|buffer| Self::new(name, buffer))
            .ok_or_else(|| NcError::TypeMismatch {
                kind,
                found: value.describe().to_string(),
            })
    }

    /// Converts into a host value, consuming the native buffer.
    ///
    /// One numeric element becomes a number (a big integer for the 64-bit
    /// kinds); any other count becomes a typed array over a copy of the
    /// elements. Text becomes a string. Strings become a string when there
    /// is exactly one, otherwise an array of strings.
    pub fn to_host_value(self, _env: &HostEnv) -> HostValue {
        match self.buffer {
            Buffer::Byte(elems) => numeric_to_host(elems),
            Buffer::Short(elems) => numeric_to_host(elems),
            Buffer::Int(elems) => numeric_to_host(elems),
            Buffer::Float(elems) => numeric_to_host(elems),
            Buffer::Double(elems) => numeric_to_host(elems),
            Buffer::UByte(elems) => numeric_to_host(elems),
            Buffer::UShort(elems) => numeric_to_host(elems),
            Buffer::UInt(elems) => numeric_to_host(elems),
            Buffer::Int64(elems) => numeric_to_host(elems),
            Buffer::UInt64(elems) => numeric_to_host(elems),
            Buffer::Char(text) => HostValue::String(text.to_string_lossy()),
            Buffer::String(mut strings) => {
                if strings.len() == 1 {
                    HostValue::String(strings.swap_remove(0))
                } else {
                    HostValue::Array(strings.into_iter().map(HostValue::String).collect())
                }
            },
        }
    }

    /// The value's name; empty for anonymous values.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The element kind.
    pub fn kind(&self) -> ElementKind {
        self.buffer.kind()
    }

    /// The element count.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// `true` if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes occupied by the buffer.
    pub fn byte_size(&self) -> usize {
        self.buffer.byte_size()
    }

    /// `true` if the buffer aliases host memory.
    pub fn is_shared(&self) -> bool {
        self.buffer.is_shared()
    }

    /// The buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// The buffer, for the library to fill.
    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    /// Consumes the value, returning its buffer.
    pub fn into_buffer(self) -> Buffer {
        self.buffer
    }
}
