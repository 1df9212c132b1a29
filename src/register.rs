//! # Register Points
//!
//! A [`RegisterDescriptor`] names one logical point on a slave: which table
//! it lives in, how its words are interpreted, where it starts and how many
//! values it spans. Descriptors are validated when built, so a session never
//! sees an impossible pairing such as a float stored in a coil.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::NamedEnum;
use crate::constants::{ADDRESS_SPACE, MAX_REQUEST_LENGTH};
use crate::error::{ModbusError, ModbusResult};

// ============================================================================
// Register type
// ============================================================================

/// Modbus data table a point lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterType {
    /// Read/write single bit
    Coil,
    /// Read-only single bit
    DiscreteInput,
    /// Read/write 16-bit word
    HoldingRegister,
    /// Read-only 16-bit word
    InputRegister,
}

impl RegisterType {
    /// Bit-addressed tables carry 0/1 bytes instead of words.
    #[inline]
    pub fn is_bit(&self) -> bool {
        matches!(self, Self::Coil | Self::DiscreteInput)
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Coil | Self::HoldingRegister)
    }

    /// Whether values of `data_type` can be stored in this table.
    pub fn supports(&self, data_type: DataType) -> bool {
        !self.is_bit() || data_type == DataType::Bool
    }
}

impl NamedEnum for RegisterType {
    const NAMES: &'static [(Self, &'static str)] = &[
        (Self::Coil, "coil"),
        (Self::DiscreteInput, "discrete_input"),
        (Self::HoldingRegister, "holding_register"),
        (Self::InputRegister, "input_register"),
    ];
}

impl FromStr for RegisterType {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| ModbusError::register_type(s))
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Data type
// ============================================================================

/// Interpretation of a point's raw words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    #[serde(rename = "uint16")]
    UInt16,
    Int16,
    String,
    #[serde(rename = "uint32")]
    UInt32,
    Int32,
    Float,
    #[serde(rename = "uint64")]
    UInt64,
    Int64,
    Double,
}

impl DataType {
    /// Registers per value: 1, 2 or 4. `None` for strings, whose length is
    /// chosen by the point definition.
    #[inline]
    pub fn register_count(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::UInt16 | Self::Int16 => Some(1),
            Self::UInt32 | Self::Int32 | Self::Float => Some(2),
            Self::UInt64 | Self::Int64 | Self::Double => Some(4),
            Self::String => None,
        }
    }

    /// True for the integer and floating point types.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Bool | Self::String)
    }
}

impl NamedEnum for DataType {
    const NAMES: &'static [(Self, &'static str)] = &[
        (Self::Bool, "bool"),
        (Self::UInt16, "uint16"),
        (Self::Int16, "int16"),
        (Self::String, "string"),
        (Self::UInt32, "uint32"),
        (Self::Int32, "int32"),
        (Self::Float, "float"),
        (Self::UInt64, "uint64"),
        (Self::Int64, "int64"),
        (Self::Double, "double"),
    ];
}

impl FromStr for DataType {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| ModbusError::register_data_type(s))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Scaling
// ============================================================================

/// Linear engineering-unit transform: `(raw + offset) * accuracy`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scaling {
    #[serde(default)]
    pub offset: Option<i32>,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl Scaling {
    pub fn new(offset: Option<i32>, accuracy: Option<f64>) -> Self {
        Self { offset, accuracy }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.offset.is_none() && self.accuracy.is_none()
    }

    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        let shifted = raw + f64::from(self.offset.unwrap_or(0));
        match self.accuracy {
            Some(accuracy) => shifted * accuracy,
            None => shifted,
        }
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// Validated definition of one register point.
///
/// `number` is the element count: the number of values for fixed-width
/// types, and the number of registers for strings.
///
/// ```rust
/// use ems_modbus_master::{DataType, RegisterDescriptor, RegisterType};
///
/// let power = RegisterDescriptor::new(RegisterType::HoldingRegister, DataType::Float, 0x0100, 3)
///     .unwrap()
///     .with_accuracy(0.001)
///     .unwrap();
/// assert_eq!(power.quantity(), 6);
///
/// assert!(RegisterDescriptor::new(RegisterType::Coil, DataType::Float, 0, 1).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor", into = "RawDescriptor")]
pub struct RegisterDescriptor {
    register_type: RegisterType,
    data_type: DataType,
    address: u16,
    number: usize,
    scaling: Scaling,
}

impl RegisterDescriptor {
    pub fn new(
        register_type: RegisterType,
        data_type: DataType,
        address: u16,
        number: usize,
    ) -> ModbusResult<Self> {
        if !register_type.supports(data_type) {
            return Err(ModbusError::register_data_type(format!(
                "{} cannot hold {}",
                register_type, data_type
            )));
        }

        let descriptor = Self {
            register_type,
            data_type,
            address,
            number,
            scaling: Scaling::default(),
        };

        let quantity = descriptor.quantity();
        if number == 0 || quantity > MAX_REQUEST_LENGTH {
            return Err(ModbusError::QuantityOutOfRange {
                requested: quantity,
                limit: MAX_REQUEST_LENGTH,
            });
        }
        if usize::from(address) + quantity > ADDRESS_SPACE {
            return Err(ModbusError::QuantityOutOfRange {
                requested: quantity,
                limit: ADDRESS_SPACE - usize::from(address),
            });
        }

        Ok(descriptor)
    }

    /// Shift decoded values by `offset` before accuracy scaling.
    pub fn with_offset(mut self, offset: i32) -> ModbusResult<Self> {
        self.require_numeric("offset")?;
        self.scaling.offset = Some(offset);
        Ok(self)
    }

    /// Multiply decoded values by `accuracy`, e.g. 0.1 turns 1234 into 123.4.
    pub fn with_accuracy(mut self, accuracy: f64) -> ModbusResult<Self> {
        self.require_numeric("accuracy")?;
        if !accuracy.is_finite() || accuracy == 0.0 {
            return Err(ModbusError::register_data_type(format!(
                "accuracy must be finite and non-zero, got {}",
                accuracy
            )));
        }
        self.scaling.accuracy = Some(accuracy);
        Ok(self)
    }

    fn require_numeric(&self, what: &str) -> ModbusResult<()> {
        if self.data_type.is_numeric() {
            Ok(())
        } else {
            Err(ModbusError::register_data_type(format!(
                "{} is not applicable to {}",
                what, self.data_type
            )))
        }
    }

    pub fn register_type(&self) -> RegisterType {
        self.register_type
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn offset(&self) -> Option<i32> {
        self.scaling.offset
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.scaling.accuracy
    }

    pub fn scaling(&self) -> Scaling {
        self.scaling
    }

    /// Registers (or bits) one transaction must cover for this point.
    pub fn quantity(&self) -> usize {
        if self.register_type.is_bit() {
            return self.number;
        }
        match self.data_type.register_count() {
            Some(width) => self.number.saturating_mul(width),
            None => self.number,
        }
    }

    /// Number of [`ActualData`](crate::ActualData) values a read produces.
    pub fn value_count(&self) -> usize {
        match self.data_type {
            DataType::String => 1,
            _ => self.number,
        }
    }
}

impl fmt::Display for RegisterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{:#06x} {}x{}",
            self.register_type, self.address, self.data_type, self.number
        )
    }
}

/// Unvalidated serde image of a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDescriptor {
    register_type: RegisterType,
    data_type: DataType,
    address: u16,
    #[serde(default = "default_number")]
    number: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    offset: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    accuracy: Option<f64>,
}

fn default_number() -> usize {
    1
}

impl TryFrom<RawDescriptor> for RegisterDescriptor {
    type Error = ModbusError;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        let mut descriptor = Self::new(raw.register_type, raw.data_type, raw.address, raw.number)?;
        if let Some(offset) = raw.offset {
            descriptor = descriptor.with_offset(offset)?;
        }
        if let Some(accuracy) = raw.accuracy {
            descriptor = descriptor.with_accuracy(accuracy)?;
        }
        Ok(descriptor)
    }
}

impl From<RegisterDescriptor> for RawDescriptor {
    fn from(descriptor: RegisterDescriptor) -> Self {
        Self {
            register_type: descriptor.register_type,
            data_type: descriptor.data_type,
            address: descriptor.address,
            number: descriptor.number,
            offset: descriptor.scaling.offset,
            accuracy: descriptor.scaling.accuracy,
        }
    }
}
