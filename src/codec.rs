//! # Register Codec
//!
//! Conversion between raw 16-bit register words and [`ActualData`].
//!
//! ## Supported Data Types
//!
//! | Type | Registers | Decoded as |
//! |------|-----------|------------|
//! | bool | 1 | low bit of the word |
//! | uint16 / int16 | 1 | `U16` / `I16` |
//! | uint32 / int32 / float | 2 | `U32` / `I32` / `F32` |
//! | uint64 / int64 / double | 4 | `U64` / `I64` / `F64` |
//! | string | all supplied | text up to the first NUL |
//!
//! Numeric values with an offset or accuracy are reported as `F64`.
//! Encoding never inverts scaling.

use crate::bytes::{
    bytes_2_to_reg, bytes_4_to_regs, bytes_8_to_regs, reg_to_bytes_2, regs_to_bytes_4,
    regs_to_bytes_8, ByteOrder,
};
use crate::config::Encoding;
use crate::error::{ModbusError, ModbusResult};
use crate::register::{DataType, Scaling};
use crate::value::ActualData;

// ============================================================================
// Decoding
// ============================================================================

/// Decode one value from raw register words.
///
/// Fixed-width types use the first 1, 2 or 4 words and ignore the rest.
/// Strings consume every supplied word.
///
/// # Example
///
/// ```rust
/// use ems_modbus_master::{decode, ActualData, DataType, Encoding, Endianness, Scaling};
///
/// let words = [0x1234, 0x5678];
/// let value = decode(&words, DataType::UInt32, Encoding::new(Endianness::Little, true), Scaling::default()).unwrap();
/// assert_eq!(value, ActualData::U32(0x5678_1234));
///
/// let scaled = decode(&[1234], DataType::UInt16, Encoding::default(), Scaling::new(None, Some(0.1))).unwrap();
/// assert!((scaled.as_f64().unwrap() - 123.4).abs() < 1e-9);
/// ```
pub fn decode(
    raw: &[u16],
    data_type: DataType,
    encoding: Encoding,
    scaling: Scaling,
) -> ModbusResult<ActualData> {
    if !scaling.is_identity() && !data_type.is_numeric() {
        return Err(ModbusError::decode(format!(
            "offset/accuracy cannot be applied to {}",
            data_type
        )));
    }

    let needed = data_type.register_count().unwrap_or(1);
    if raw.len() < needed {
        return Err(ModbusError::decode(format!(
            "{} needs {} register(s), got {}",
            data_type,
            needed,
            raw.len()
        )));
    }

    let order = ByteOrder::from(encoding);
    let value = match data_type {
        DataType::Bool => ActualData::Bool(raw[0] & 0x0001 != 0),
        DataType::UInt16 => ActualData::U16(u16::from_be_bytes(reg_to_bytes_2(raw[0], order))),
        DataType::Int16 => ActualData::I16(i16::from_be_bytes(reg_to_bytes_2(raw[0], order))),
        DataType::UInt32 => ActualData::U32(u32::from_be_bytes(word_pair(raw, order))),
        DataType::Int32 => ActualData::I32(i32::from_be_bytes(word_pair(raw, order))),
        DataType::Float => ActualData::F32(f32::from_be_bytes(word_pair(raw, order))),
        DataType::UInt64 => ActualData::U64(u64::from_be_bytes(word_quad(raw, order))),
        DataType::Int64 => ActualData::I64(i64::from_be_bytes(word_quad(raw, order))),
        DataType::Double => ActualData::F64(f64::from_be_bytes(word_quad(raw, order))),
        DataType::String => ActualData::String(decode_string(raw, order)),
    };

    if scaling.is_identity() {
        return Ok(value);
    }
    match value.as_f64() {
        Some(number) => Ok(ActualData::F64(scaling.apply(number))),
        None => Err(ModbusError::decode(format!(
            "{} value is not numeric",
            value.type_name()
        ))),
    }
}

/// Decode `number` consecutive values laid out back to back.
///
/// For strings `number` is the register count and one value is produced.
pub fn decode_values(
    raw: &[u16],
    data_type: DataType,
    number: usize,
    encoding: Encoding,
    scaling: Scaling,
) -> ModbusResult<Vec<ActualData>> {
    let width = data_type.register_count().unwrap_or(number);
    let needed = width.saturating_mul(if data_type == DataType::String { 1 } else { number });
    if raw.len() < needed {
        return Err(ModbusError::decode(format!(
            "{} x{} needs {} register(s), got {}",
            data_type,
            number,
            needed,
            raw.len()
        )));
    }

    if data_type == DataType::String {
        return Ok(vec![decode(&raw[..needed], data_type, encoding, scaling)?]);
    }

    raw[..needed]
        .chunks_exact(width)
        .map(|chunk| decode(chunk, data_type, encoding, scaling))
        .collect()
}

#[inline]
fn word_pair(raw: &[u16], order: ByteOrder) -> [u8; 4] {
    regs_to_bytes_4(&[raw[0], raw[1]], order)
}

#[inline]
fn word_quad(raw: &[u16], order: ByteOrder) -> [u8; 8] {
    regs_to_bytes_8(&[raw[0], raw[1], raw[2], raw[3]], order)
}

fn decode_string(raw: &[u16], order: ByteOrder) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .flat_map(|reg| reg_to_bytes_2(*reg, order))
        .take_while(|b| *b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a value as raw register words.
///
/// The variant must match `data_type`. Strings produce one word per two
/// bytes, padding the last word with NUL.
///
/// ```rust
/// use ems_modbus_master::{encode, ActualData, DataType, Encoding, Endianness};
///
/// let words = encode(&ActualData::U32(0x1234_5678), DataType::UInt32, Encoding::new(Endianness::Big, true)).unwrap();
/// assert_eq!(words, vec![0x3412, 0x7856]);
/// ```
pub fn encode(value: &ActualData, data_type: DataType, encoding: Encoding) -> ModbusResult<Vec<u16>> {
    let order = ByteOrder::from(encoding);
    match (value, data_type) {
        (ActualData::Bool(b), DataType::Bool) => Ok(vec![u16::from(*b)]),
        (ActualData::U16(v), DataType::UInt16) => Ok(vec![bytes_2_to_reg(v.to_be_bytes(), order)]),
        (ActualData::I16(v), DataType::Int16) => Ok(vec![bytes_2_to_reg(v.to_be_bytes(), order)]),
        (ActualData::U32(v), DataType::UInt32) => Ok(bytes_4_to_regs(&v.to_be_bytes(), order).to_vec()),
        (ActualData::I32(v), DataType::Int32) => Ok(bytes_4_to_regs(&v.to_be_bytes(), order).to_vec()),
        (ActualData::F32(v), DataType::Float) => Ok(bytes_4_to_regs(&v.to_be_bytes(), order).to_vec()),
        (ActualData::U64(v), DataType::UInt64) => Ok(bytes_8_to_regs(&v.to_be_bytes(), order).to_vec()),
        (ActualData::I64(v), DataType::Int64) => Ok(bytes_8_to_regs(&v.to_be_bytes(), order).to_vec()),
        (ActualData::F64(v), DataType::Double) => Ok(bytes_8_to_regs(&v.to_be_bytes(), order).to_vec()),
        (ActualData::String(s), DataType::String) => Ok(encode_string(s, order)),
        (other, _) => Err(ModbusError::decode(format!(
            "cannot encode {} value as {}",
            other.type_name(),
            data_type
        ))),
    }
}

/// Encode values for a point of `number` elements.
///
/// Fixed-width types require exactly `number` values. A string point takes a
/// single value and is NUL padded to `number` registers.
pub fn encode_values(
    values: &[ActualData],
    data_type: DataType,
    number: usize,
    encoding: Encoding,
) -> ModbusResult<Vec<u16>> {
    if data_type == DataType::String {
        let [value] = values else {
            return Err(ModbusError::decode(format!(
                "string point takes one value, got {}",
                values.len()
            )));
        };
        let mut words = encode(value, data_type, encoding)?;
        if words.len() > number {
            return Err(ModbusError::decode(format!(
                "string needs {} register(s), point holds {}",
                words.len(),
                number
            )));
        }
        words.resize(number, 0);
        return Ok(words);
    }

    if values.len() != number {
        return Err(ModbusError::decode(format!(
            "expected {} {} value(s), got {}",
            number,
            data_type,
            values.len()
        )));
    }

    let mut words = Vec::with_capacity(number * data_type.register_count().unwrap_or(1));
    for value in values {
        words.extend(encode(value, data_type, encoding)?);
    }
    Ok(words)
}

/// Encode a plain number as `data_type`, clamping to the type's range.
///
/// Useful when a setpoint arrives as `f64` from upstream and the register
/// is narrower (70000 written to a uint16 becomes 65535).
pub fn encode_numeric(value: f64, data_type: DataType, encoding: Encoding) -> ModbusResult<Vec<u16>> {
    let clamped = clamp_to_data_type(value, data_type);
    let typed = match data_type {
        DataType::Bool => ActualData::Bool(clamped != 0.0),
        DataType::UInt16 => ActualData::U16(clamped as u16),
        DataType::Int16 => ActualData::I16(clamped as i16),
        DataType::UInt32 => ActualData::U32(clamped as u32),
        DataType::Int32 => ActualData::I32(clamped as i32),
        DataType::Float => ActualData::F32(clamped as f32),
        DataType::UInt64 => ActualData::U64(clamped as u64),
        DataType::Int64 => ActualData::I64(clamped as i64),
        DataType::Double => ActualData::F64(clamped),
        DataType::String => {
            return Err(ModbusError::decode("cannot encode a number as string"));
        }
    };
    encode(&typed, data_type, encoding)
}

/// Clamp a value to the representable range of `data_type`.
pub fn clamp_to_data_type(value: f64, data_type: DataType) -> f64 {
    let (min, max): (f64, f64) = match data_type {
        DataType::UInt16 => (0.0, f64::from(u16::MAX)),
        DataType::Int16 => (f64::from(i16::MIN), f64::from(i16::MAX)),
        DataType::UInt32 => (0.0, f64::from(u32::MAX)),
        DataType::Int32 => (f64::from(i32::MIN), f64::from(i32::MAX)),
        DataType::UInt64 => (0.0, u64::MAX as f64),
        DataType::Int64 => (i64::MIN as f64, i64::MAX as f64),
        DataType::Float => (f64::from(f32::MIN), f64::from(f32::MAX)),
        DataType::Double | DataType::Bool | DataType::String => return value,
    };
    value.clamp(min, max)
}

fn encode_string(s: &str, order: ByteOrder) -> Vec<u16> {
    s.as_bytes()
        .chunks(2)
        .map(|chunk| {
            let pair = [chunk[0], chunk.get(1).copied().unwrap_or(0)];
            bytes_2_to_reg(pair, order)
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
