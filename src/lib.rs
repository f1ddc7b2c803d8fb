pub mod schema;
pub mod value;
pub mod varint;
pub mod encode;
pub mod decode;
pub mod header;
pub mod container;
pub mod datum;

pub use schema::{Field, Schema, SchemaError, TypeTag};
pub use value::{Record, Value};
pub use encode::{encode_record, encode_record_into, EncodingError};
pub use decode::{decode_record, DecodingError};
pub use header::{ContainerHeader, HeaderError, MAGIC, SYNC_MARKER_LEN};
pub use container::{ContainerError, ContainerReader, ContainerWriter, WriterOptions};
pub use datum::{Datum, TypedReader, TypedWriter};
