//! Scalar field encoding.
//!
//! Each [Scalar] kind maps to exactly one wire representation:
//!
//! | kind | wire type | encoding |
//! |---|---|---|
//! | `bool` | varint | `0` or `1`; any nonzero value decodes as `true` |
//! | `int32`, `int64` | varint | two's complement (negative `int32` is sign-extended to 10 bytes) |
//! | `sint32`, `sint64` | varint | ZigZag |
//! | `uint32`, `uint64` | varint | unsigned |
//! | `fixed32`, `sfixed32`, `float` | fixed32 | little-endian |
//! | `fixed64`, `sfixed64`, `double` | fixed64 | little-endian |
//! | `string` | length-delimited | UTF-8 |
//! | `bytes` | length-delimited | raw |
//!
//! Like other Protocol Buffers implementations, 32-bit varint kinds keep only the low 32 bits
//! of a decoded 64-bit varint.

use crate::{
    schema::Scalar,
    value::Value,
    varint,
    wire::{Reader, Writer},
    Error,
};

/// Converts a value to the `u64` carried by a varint for `scalar`, or `None` if the value does
/// not belong to a varint kind.
fn varint_value(scalar: Scalar, value: &Value) -> Option<u64> {
    match (scalar, value) {
        (Scalar::Bool, Value::Bool(v)) => Some(*v as u64),
        // Sign extension to 64 bits
        (Scalar::Int32, Value::I32(v)) => Some(*v as i64 as u64),
        (Scalar::Int64, Value::I64(v)) => Some(*v as u64),
        (Scalar::Uint32, Value::U32(v)) => Some(*v as u64),
        (Scalar::Uint64, Value::U64(v)) => Some(*v),
        (Scalar::Sint32, Value::I32(v)) => Some(varint::zigzag(*v as i64)),
        (Scalar::Sint64, Value::I64(v)) => Some(varint::zigzag(*v)),
        _ => None,
    }
}

/// Returns true if `value` is the representation of `scalar`.
pub fn is_compatible(scalar: Scalar, value: &Value) -> bool {
    matches!(
        (scalar, value),
        (Scalar::Bool, Value::Bool(_))
            | (Scalar::Int32 | Scalar::Sint32 | Scalar::Sfixed32, Value::I32(_))
            | (Scalar::Int64 | Scalar::Sint64 | Scalar::Sfixed64, Value::I64(_))
            | (Scalar::Uint32 | Scalar::Fixed32, Value::U32(_))
            | (Scalar::Uint64 | Scalar::Fixed64, Value::U64(_))
            | (Scalar::Float, Value::F32(_))
            | (Scalar::Double, Value::F64(_))
            | (Scalar::String, Value::String(_))
            | (Scalar::Bytes, Value::Bytes(_))
    )
}

fn mismatch(scalar: Scalar, value: &Value) -> Error {
    Error::InvalidValue(
        scalar.name().to_string(),
        format!("found {}", value.kind()),
    )
}

/// Writes the payload (no tag) of `value` as `scalar`.
pub fn write_scalar(writer: &mut Writer, scalar: Scalar, value: &Value) -> Result<(), Error> {
    if let Some(v) = varint_value(scalar, value) {
        writer.write_varint(v);
        return Ok(());
    }
    match (scalar, value) {
        (Scalar::Fixed32, Value::U32(v)) => writer.write_fixed32(*v),
        (Scalar::Sfixed32, Value::I32(v)) => writer.write_fixed32(*v as u32),
        (Scalar::Float, Value::F32(v)) => writer.write_fixed32(v.to_bits()),
        (Scalar::Fixed64, Value::U64(v)) => writer.write_fixed64(*v),
        (Scalar::Sfixed64, Value::I64(v)) => writer.write_fixed64(*v as u64),
        (Scalar::Double, Value::F64(v)) => writer.write_fixed64(v.to_bits()),
        (Scalar::String, Value::String(v)) => writer.write_length_delimited(v.as_bytes()),
        (Scalar::Bytes, Value::Bytes(v)) => writer.write_length_delimited(v),
        _ => return Err(mismatch(scalar, value)),
    }
    Ok(())
}

/// Returns the number of bytes [write_scalar] produces.
pub fn scalar_len(scalar: Scalar, value: &Value) -> Result<usize, Error> {
    if let Some(v) = varint_value(scalar, value) {
        return Ok(varint::size(v));
    }
    match (scalar, value) {
        (Scalar::Fixed32, Value::U32(_))
        | (Scalar::Sfixed32, Value::I32(_))
        | (Scalar::Float, Value::F32(_)) => Ok(4),
        (Scalar::Fixed64, Value::U64(_))
        | (Scalar::Sfixed64, Value::I64(_))
        | (Scalar::Double, Value::F64(_)) => Ok(8),
        (Scalar::String, Value::String(v)) => Ok(delimited_len(v.len())),
        (Scalar::Bytes, Value::Bytes(v)) => Ok(delimited_len(v.len())),
        _ => Err(mismatch(scalar, value)),
    }
}

/// Size of a length prefix plus `len` bytes.
pub fn delimited_len(len: usize) -> usize {
    varint::size(len as u64) + len
}

/// Reads the payload (tag already consumed) of a `scalar` field.
pub fn read_scalar(reader: &mut Reader, scalar: Scalar) -> Result<Value, Error> {
    let value = match scalar {
        Scalar::Bool => Value::Bool(reader.read_varint()? != 0),
        Scalar::Int32 => Value::I32(reader.read_varint()? as i32),
        Scalar::Int64 => Value::I64(reader.read_varint()? as i64),
        Scalar::Uint32 => Value::U32(reader.read_varint()? as u32),
        Scalar::Uint64 => Value::U64(reader.read_varint()?),
        Scalar::Sint32 => Value::I32(varint::unzigzag(reader.read_varint()? as u32 as u64) as i32),
        Scalar::Sint64 => Value::I64(varint::unzigzag(reader.read_varint()?)),
        Scalar::Fixed32 => Value::U32(reader.read_fixed32()?),
        Scalar::Sfixed32 => Value::I32(reader.read_fixed32()? as i32),
        Scalar::Float => Value::F32(f32::from_bits(reader.read_fixed32()?)),
        Scalar::Fixed64 => Value::U64(reader.read_fixed64()?),
        Scalar::Sfixed64 => Value::I64(reader.read_fixed64()? as i64),
        Scalar::Double => Value::F64(f64::from_bits(reader.read_fixed64()?)),
        Scalar::String => {
            let len = reader.read_length()?;
            let bytes = reader.read_bytes(len)?;
            let text = std::str::from_utf8(&bytes).map_err(|_| Error::InvalidUtf8)?;
            Value::String(text.to_string())
        }
        Scalar::Bytes => {
            let len = reader.read_length()?;
            Value::Bytes(reader.read_bytes(len)?)
        }
    };
    Ok(value)
}

/// The zero value of `scalar`.
pub fn default_value(scalar: Scalar) -> Value {
    match scalar {
        Scalar::Bool => Value::Bool(false),
        Scalar::Int32 | Scalar::Sint32 | Scalar::Sfixed32 => Value::I32(0),
        Scalar::Int64 | Scalar::Sint64 | Scalar::Sfixed64 => Value::I64(0),
        Scalar::Uint32 | Scalar::Fixed32 => Value::U32(0),
        Scalar::Uint64 | Scalar::Fixed64 => Value::U64(0),
        Scalar::Float => Value::F32(0.0),
        Scalar::Double => Value::F64(0.0),
        Scalar::String => Value::String(String::new()),
        Scalar::Bytes => Value::Bytes(Default::default()),
    }
}

/// Returns true if `value` equals its kind's zero value. Negative zero is not a default
/// (its bit pattern differs).
pub fn is_default(value: &Value) -> bool {
    match value {
        Value::Bool(v) => !*v,
        Value::I32(v) | Value::Enum(v) => *v == 0,
        Value::I64(v) => *v == 0,
        Value::U32(v) => *v == 0,
        Value::U64(v) => *v == 0,
        Value::F32(v) => v.to_bits() == 0,
        Value::F64(v) => v.to_bits() == 0,
        Value::String(v) => v.is_empty(),
        Value::Bytes(v) => v.is_empty(),
        Value::Message(_) => false,
    }
}
