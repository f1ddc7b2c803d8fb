//! Binary decoder: bytes → record, driven by a schema.
//!
//! Walks the schema exactly as the encoder did and produces a generic
//! [`Record`]; this is what lets a reader reconstruct records purely
//! from the schema embedded in a file.
//!
//! Length prefixes read from the stream are untrusted: byte buffers are
//! filled through `Read::take` (allocation grows only as bytes actually
//! arrive) and any declared length above [`MAX_DECODE_LEN`] is rejected
//! outright.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

use crate::schema::{Schema, TypeTag};
use crate::value::{Record, Value};
use crate::varint::{self, VarintError};

/// Upper bound on any single declared length (string bytes, block payload).
pub const MAX_DECODE_LEN: u64 = 1 << 30;

#[derive(Error, Debug)]
pub enum DecodingError {
    #[error("source exhausted before value completed")]
    UnexpectedEof,
    #[error("varint exceeds maximum representable width")]
    VarintOverflow,
    #[error("negative length prefix: {0}")]
    NegativeLength(i64),
    #[error("declared length {len} exceeds decode limit {max}")]
    LengthOverflow { len: u64, max: u64 },
    #[error("value {0} does not fit in int32")]
    IntOutOfRange(i64),
    #[error("invalid boolean byte: {0:#04x}")]
    InvalidBool(u8),
    #[error("invalid UTF-8 in string value: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for DecodingError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DecodingError::UnexpectedEof
        } else {
            DecodingError::Io(e)
        }
    }
}

impl From<VarintError> for DecodingError {
    fn from(e: VarintError) -> Self {
        match e {
            VarintError::Overflow => DecodingError::VarintOverflow,
            VarintError::Io(e) => e.into(),
        }
    }
}

/// Decode one record from `source` according to `schema`.
pub fn decode_record<R: Read>(schema: &Schema, source: &mut R) -> Result<Record, DecodingError> {
    let mut record = Record::new();
    for field in schema.fields() {
        let value = read_value(field.tag(), source)?;
        record.set(field.name(), value);
    }
    Ok(record)
}

fn read_value<R: Read>(tag: &TypeTag, r: &mut R) -> Result<Value, DecodingError> {
    match tag {
        TypeTag::Int32 => {
            let n = varint::read_long(r)?;
            let n = i32::try_from(n).map_err(|_| DecodingError::IntOutOfRange(n))?;
            Ok(Value::Int32(n))
        }
        TypeTag::Int64 => Ok(Value::Int64(varint::read_long(r)?)),
        TypeTag::Float64 => Ok(Value::Float64(r.read_f64::<LittleEndian>()?)),
        TypeTag::String => {
            let len = read_len(r)?;
            let bytes = read_exact_len(r, len)?;
            Ok(Value::Str(String::from_utf8(bytes)?))
        }
        TypeTag::Boolean => match r.read_u8()? {
            0 => Ok(Value::Boolean(false)),
            1 => Ok(Value::Boolean(true)),
            other => Err(DecodingError::InvalidBool(other)),
        },
        TypeTag::Record(inner) => Ok(Value::Record(decode_record(inner, r)?)),
        TypeTag::Array(item) => {
            let mut values = Vec::new();
            loop {
                let count = varint::read_long(r)?;
                if count == 0 {
                    break;
                }
                if count < 0 {
                    return Err(DecodingError::NegativeLength(count));
                }
                // No reservation from the untrusted count; items accrue
                // one at a time and truncation surfaces as UnexpectedEof.
                for _ in 0..count {
                    values.push(read_value(item, r)?);
                }
            }
            Ok(Value::Array(values))
        }
    }
}

/// Read a varint length prefix, rejecting negatives and absurd sizes.
pub(crate) fn read_len<R: Read>(r: &mut R) -> Result<u64, DecodingError> {
    let n = varint::read_long(r)?;
    if n < 0 {
        return Err(DecodingError::NegativeLength(n));
    }
    let len = n as u64;
    if len > MAX_DECODE_LEN {
        return Err(DecodingError::LengthOverflow { len, max: MAX_DECODE_LEN });
    }
    Ok(len)
}

/// Read exactly `len` bytes without pre-allocating `len` up front.
pub(crate) fn read_exact_len<R: Read>(r: &mut R, len: u64) -> Result<Vec<u8>, DecodingError> {
    let mut bytes = Vec::new();
    r.take(len).read_to_end(&mut bytes)?;
    if bytes.len() as u64 != len {
        return Err(DecodingError::UnexpectedEof);
    }
    Ok(bytes)
}

/// Read a length-prefixed UTF-8 string.
pub(crate) fn read_string<R: Read>(r: &mut R) -> Result<String, DecodingError> {
    let len = read_len(r)?;
    Ok(String::from_utf8(read_exact_len(r, len)?)?)
}
