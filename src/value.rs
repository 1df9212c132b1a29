//! # Decoded Register Values
//!
//! [`ActualData`] is the closed set of values a register point can hold once
//! decoded. Exactly one variant is populated per value.

use std::fmt;

use crate::register::DataType;

/// Typed value of a register point.
///
/// # Register Mapping
///
/// | Variant | Registers | Data type |
/// |---------|-----------|-----------|
/// | Bool | 1 (or 1 coil) | `bool` |
/// | U16/I16 | 1 | `uint16` / `int16` |
/// | U32/I32/F32 | 2 | `uint32` / `int32` / `float` |
/// | U64/I64/F64 | 4 | `uint64` / `int64` / `double` |
/// | String | ⌈len/2⌉ | `string` |
///
/// # Example
///
/// ```rust
/// use ems_modbus_master::ActualData;
///
/// let temp = ActualData::F32(25.5);
/// assert_eq!(temp.register_count(), 2);
/// assert_eq!(temp.as_f64(), Some(25.5));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ActualData {
    /// No value
    #[default]
    Absent,
    Bool(bool),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
}

impl ActualData {
    /// Numeric view of the value. `None` for `Absent` and `String`.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ActualData::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ActualData::U16(v) => Some(f64::from(*v)),
            ActualData::I16(v) => Some(f64::from(*v)),
            ActualData::U32(v) => Some(f64::from(*v)),
            ActualData::I32(v) => Some(f64::from(*v)),
            ActualData::U64(v) => Some(*v as f64),
            ActualData::I64(v) => Some(*v as f64),
            ActualData::F32(v) => Some(f64::from(*v)),
            ActualData::F64(v) => Some(*v),
            ActualData::Absent | ActualData::String(_) => None,
        }
    }

    /// Boolean view: non-zero numbers are `true`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ActualData::Bool(b) => Some(*b),
            other => other.as_f64().map(|v| v != 0.0),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ActualData::String(s) => Some(s),
            _ => None,
        }
    }

    /// Number of 16-bit registers this value occupies when written.
    ///
    /// Strings take one register per two bytes.
    #[inline]
    pub fn register_count(&self) -> usize {
        match self {
            ActualData::Absent => 0,
            ActualData::Bool(_) | ActualData::U16(_) | ActualData::I16(_) => 1,
            ActualData::U32(_) | ActualData::I32(_) | ActualData::F32(_) => 2,
            ActualData::U64(_) | ActualData::I64(_) | ActualData::F64(_) => 4,
            ActualData::String(s) => s.len().div_ceil(2),
        }
    }

    /// Data type this variant encodes as, `None` for `Absent`.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            ActualData::Absent => None,
            ActualData::Bool(_) => Some(DataType::Bool),
            ActualData::U16(_) => Some(DataType::UInt16),
            ActualData::I16(_) => Some(DataType::Int16),
            ActualData::U32(_) => Some(DataType::UInt32),
            ActualData::I32(_) => Some(DataType::Int32),
            ActualData::U64(_) => Some(DataType::UInt64),
            ActualData::I64(_) => Some(DataType::Int64),
            ActualData::F32(_) => Some(DataType::Float),
            ActualData::F64(_) => Some(DataType::Double),
            ActualData::String(_) => Some(DataType::String),
        }
    }

    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, ActualData::Absent)
    }

    /// Type name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            ActualData::Absent => "absent",
            ActualData::Bool(_) => "bool",
            ActualData::U16(_) => "u16",
            ActualData::I16(_) => "i16",
            ActualData::U32(_) => "u32",
            ActualData::I32(_) => "i32",
            ActualData::U64(_) => "u64",
            ActualData::I64(_) => "i64",
            ActualData::F32(_) => "f32",
            ActualData::F64(_) => "f64",
            ActualData::String(_) => "string",
        }
    }
}

impl fmt::Display for ActualData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActualData::Absent => f.write_str("-"),
            ActualData::Bool(v) => write!(f, "{}", v),
            ActualData::U16(v) => write!(f, "{}", v),
            ActualData::I16(v) => write!(f, "{}", v),
            ActualData::U32(v) => write!(f, "{}", v),
            ActualData::I32(v) => write!(f, "{}", v),
            ActualData::U64(v) => write!(f, "{}", v),
            ActualData::I64(v) => write!(f, "{}", v),
            ActualData::F32(v) => write!(f, "{}", v),
            ActualData::F64(v) => write!(f, "{}", v),
            ActualData::String(v) => f.write_str(v),
        }
    }
}

// ============================================================================
// From implementations for ergonomic construction
// ============================================================================

impl From<bool> for ActualData {
    fn from(v: bool) -> Self {
        ActualData::Bool(v)
    }
}

impl From<u16> for ActualData {
    fn from(v: u16) -> Self {
        ActualData::U16(v)
    }
}

impl From<i16> for ActualData {
    fn from(v: i16) -> Self {
        ActualData::I16(v)
    }
}

impl From<u32> for ActualData {
    fn from(v: u32) -> Self {
        ActualData::U32(v)
    }
}

impl From<i32> for ActualData {
    fn from(v: i32) -> Self {
        ActualData::I32(v)
    }
}

impl From<u64> for ActualData {
    fn from(v: u64) -> Self {
        ActualData::U64(v)
    }
}

impl From<i64> for ActualData {
    fn from(v: i64) -> Self {
        ActualData::I64(v)
    }
}

impl From<f32> for ActualData {
    fn from(v: f32) -> Self {
        ActualData::F32(v)
    }
}

impl From<f64> for ActualData {
    fn from(v: f64) -> Self {
        ActualData::F64(v)
    }
}

impl From<String> for ActualData {
    fn from(v: String) -> Self {
        ActualData::String(v)
    }
}

impl From<&str> for ActualData {
    fn from(v: &str) -> Self {
        ActualData::String(v.to_string())
    }
}
