//! Cross-boundary value model.
//!
//! `Value` is the host-side representation of one decoded guest argument or
//! one callable result. Each numeric variant carries the width the guest
//! declared on the wire, regardless of how narrowly the payload was
//! transmitted; callables always observe the declared width.

use std::sync::Arc;

use crate::traits::HostFunction;

/// A host-side value crossing the guest boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Undefined,
    Bool(bool),
    Text(String),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    /// Raw handle into one of the bridge heaps. Stale handles are replaced
    /// with [`Value::Null`] before a callable ever sees them.
    ExternRef(u64),
    /// Guest-internal pointer-sized value, passed through untouched.
    InternalRef(u64),
    Int128(i128),
    Uint128(u128),
    Int8Array(Vec<i8>),
    Int16Array(Vec<i16>),
    Int32Array(Vec<i32>),
    Int64Array(Vec<i64>),
    Uint8Array(Vec<u8>),
    Uint16Array(Vec<u16>),
    Uint32Array(Vec<u32>),
    Uint64Array(Vec<u64>),
    Float32Array(Vec<f32>),
    Float64Array(Vec<f64>),
}

impl Value {
    /// Short name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Bool(_) => "bool",
            Value::Text(_) => "text",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Uint8(_) => "uint8",
            Value::Uint16(_) => "uint16",
            Value::Uint32(_) => "uint32",
            Value::Uint64(_) => "uint64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::ExternRef(_) => "extern-ref",
            Value::InternalRef(_) => "internal-ref",
            Value::Int128(_) => "int128",
            Value::Uint128(_) => "uint128",
            Value::Int8Array(_) => "int8-array",
            Value::Int16Array(_) => "int16-array",
            Value::Int32Array(_) => "int32-array",
            Value::Int64Array(_) => "int64-array",
            Value::Uint8Array(_) => "uint8-array",
            Value::Uint16Array(_) => "uint16-array",
            Value::Uint32Array(_) => "uint32-array",
            Value::Uint64Array(_) => "uint64-array",
            Value::Float32Array(_) => "float32-array",
            Value::Float64Array(_) => "float64-array",
        }
    }

    /// True for `Null` and `Undefined`.
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Widen any signed or unsigned integer variant to `i64`.
    ///
    /// Unsigned 64-bit values reinterpret as two's complement; 128-bit
    /// variants yield their low 64 bits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int8(v) => Some(v as i64),
            Value::Int16(v) => Some(v as i64),
            Value::Int32(v) => Some(v as i64),
            Value::Int64(v) => Some(v),
            Value::Uint8(v) => Some(v as i64),
            Value::Uint16(v) => Some(v as i64),
            Value::Uint32(v) => Some(v as i64),
            Value::Uint64(v) => Some(v as i64),
            Value::Int128(v) => Some(v as i64),
            Value::Uint128(v) => Some(v as i64),
            _ => None,
        }
    }

    /// Widen any integer variant to `u64` (two's complement bits).
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().map(|v| v as u64)
    }

    /// Widen either float variant to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float32(v) => Some(v as f64),
            Value::Float64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The raw handle behind an extern or internal reference.
    pub fn as_ref_handle(&self) -> Option<u64> {
        match *self {
            Value::ExternRef(h) | Value::InternalRef(h) => Some(h),
            _ => None,
        }
    }
}

/// Object-heap slot content: pre-allocated null or a hosted value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ObjectEntry {
    #[default]
    Null,
    Value(Value),
}

impl ObjectEntry {
    /// The hosted value, or `None` for a pre-allocated null slot.
    pub fn value(&self) -> Option<&Value> {
        match self {
            ObjectEntry::Null => None,
            ObjectEntry::Value(v) => Some(v),
        }
    }
}

/// Function-heap slot content: pre-allocated null or a registered callable.
#[derive(Clone, Default)]
pub enum FunctionEntry {
    #[default]
    Null,
    Callable(Arc<dyn HostFunction>),
}

impl FunctionEntry {
    /// The callable, or `None` for a slot not yet populated.
    pub fn callable(&self) -> Option<&Arc<dyn HostFunction>> {
        match self {
            FunctionEntry::Null => None,
            FunctionEntry::Callable(f) => Some(f),
        }
    }
}

impl std::fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionEntry::Null => f.write_str("FunctionEntry::Null"),
            FunctionEntry::Callable(_) => f.write_str("FunctionEntry::Callable(..)"),
        }
    }
}
