use std::collections::HashMap;
use std::io::{self, Read, Write};

use thiserror::Error;

use crate::decode::{self, DecodingError};
use crate::schema::{Schema, SchemaError};
use crate::varint;

pub const MAGIC: &[u8; 4] = b".ctn";
pub const SYNC_MARKER_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("invalid magic number")]
    InvalidMagic,
    #[error("container header truncated")]
    Truncated,
    #[error("malformed header schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("malformed header framing: {0}")]
    Decoding(DecodingError),
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for HeaderError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            HeaderError::Truncated
        } else {
            HeaderError::Io(e)
        }
    }
}

impl From<DecodingError> for HeaderError {
    fn from(e: DecodingError) -> Self {
        match e {
            DecodingError::UnexpectedEof => HeaderError::Truncated,
            other => HeaderError::Decoding(other),
        }
    }
}

/// Container file header: magic, embedded schema text, file metadata, and
/// the sync marker every block must repeat.
#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub schema: Schema,
    pub metadata: HashMap<String, String>,
    pub sync_marker: [u8; SYNC_MARKER_LEN],
}

impl ContainerHeader {
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let text = self
            .schema
            .canonical_text()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        let mut frame = Vec::with_capacity(text.len() + 64);
        frame.extend_from_slice(MAGIC);
        varint::encode_long(text.len() as i64, &mut frame);
        frame.extend_from_slice(text.as_bytes());

        // Keys sorted so the same (schema, metadata, marker) always
        // produces identical header bytes.
        let mut keys: Vec<&String> = self.metadata.keys().collect();
        keys.sort();
        varint::encode_long(keys.len() as i64, &mut frame);
        for key in keys {
            varint::encode_long(key.len() as i64, &mut frame);
            frame.extend_from_slice(key.as_bytes());
            let value = &self.metadata[key];
            varint::encode_long(value.len() as i64, &mut frame);
            frame.extend_from_slice(value.as_bytes());
        }
        frame.extend_from_slice(&self.sync_marker);

        writer.write_all(&frame)
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self, HeaderError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(HeaderError::InvalidMagic);
        }

        let schema_len = decode::read_len(reader)?;
        let schema_bytes = decode::read_exact_len(reader, schema_len)?;
        let schema_text =
            String::from_utf8(schema_bytes).map_err(|e| HeaderError::Decoding(e.into()))?;
        let schema = Schema::parse(&schema_text)?;

        let pair_count = varint::read_long(reader).map_err(DecodingError::from)?;
        if pair_count < 0 {
            return Err(DecodingError::NegativeLength(pair_count).into());
        }
        let mut metadata = HashMap::new();
        for _ in 0..pair_count {
            let key = decode::read_string(reader)?;
            let value = decode::read_string(reader)?;
            metadata.insert(key, value);
        }

        let mut sync_marker = [0u8; SYNC_MARKER_LEN];
        reader.read_exact(&mut sync_marker)?;

        Ok(Self { schema, metadata, sync_marker })
    }
}
