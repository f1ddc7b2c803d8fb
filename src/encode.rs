//! Binary encoder: record → bytes, driven by a schema.
//!
//! Per-type rules: integers are zig-zag varints, floats are fixed 8-byte
//! little-endian, strings are length-prefixed UTF-8, booleans one byte,
//! nested records encode field-by-field with no length prefix, arrays are
//! non-empty counted item blocks terminated by a zero count.
//!
//! Appending to a sink is atomic per record: validation and encoding run
//! against a scratch buffer first, so a record that fails the type check
//! never leaves partial bytes behind.

use thiserror::Error;

use crate::schema::{Schema, TypeTag};
use crate::value::{Record, Value};
use crate::varint;

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("field {field:?}: schema expects {expected}, record holds {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("record is missing field {0:?}")]
    MissingField(String),
    #[error("record field {0:?} is not in the schema")]
    UnexpectedField(String),
}

/// Encode one record against `schema` into a fresh buffer.
pub fn encode_record(schema: &Schema, record: &Record) -> Result<Vec<u8>, EncodingError> {
    let mut buf = Vec::new();
    write_record(schema, record, &mut buf)?;
    Ok(buf)
}

/// Encode one record and append it to `sink`.  On error the sink is left
/// exactly as it was.
pub fn encode_record_into(
    schema: &Schema,
    record: &Record,
    sink: &mut Vec<u8>,
) -> Result<(), EncodingError> {
    let bytes = encode_record(schema, record)?;
    sink.extend_from_slice(&bytes);
    Ok(())
}

fn write_record(schema: &Schema, record: &Record, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
    // Exact shape: every record field must exist in the schema...
    for (name, _) in record.iter() {
        if schema.field(name).is_none() {
            return Err(EncodingError::UnexpectedField(name.to_owned()));
        }
    }
    // ...and every schema field must be present, encoded in schema order.
    for field in schema.fields() {
        let value = record
            .get(field.name())
            .ok_or_else(|| EncodingError::MissingField(field.name().to_owned()))?;
        write_value(field.name(), field.tag(), value, buf)?;
    }
    Ok(())
}

fn write_value(
    field: &str,
    tag: &TypeTag,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Result<(), EncodingError> {
    match (tag, value) {
        (TypeTag::Int32, Value::Int32(n)) => varint::encode_long(*n as i64, buf),
        (TypeTag::Int64, Value::Int64(n)) => varint::encode_long(*n, buf),
        (TypeTag::Float64, Value::Float64(x)) => buf.extend_from_slice(&x.to_le_bytes()),
        (TypeTag::String, Value::Str(s)) => {
            varint::encode_long(s.len() as i64, buf);
            buf.extend_from_slice(s.as_bytes());
        }
        (TypeTag::Boolean, Value::Boolean(b)) => buf.push(*b as u8),
        (TypeTag::Record(inner), Value::Record(nested)) => write_record(inner, nested, buf)?,
        (TypeTag::Array(item), Value::Array(values)) => {
            if !values.is_empty() {
                varint::encode_long(values.len() as i64, buf);
                for value in values {
                    write_value(field, item, value, buf)?;
                }
            }
            varint::encode_long(0, buf);
        }
        (tag, value) => {
            return Err(EncodingError::TypeMismatch {
                field: field.to_owned(),
                expected: tag.name(),
                found: value.type_name(),
            })
        }
    }
    Ok(())
}
