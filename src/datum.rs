//! Typed record access: the seam a code generator would fill.
//!
//! [`Datum`] binds a native type to a schema; [`TypedWriter`] and
//! [`TypedReader`] are thin adapters over the container engine that
//! convert through the same [`Record`] intermediate the dynamic reader
//! exposes directly.  The typed reader accepts a file only when its
//! embedded schema is structurally equal to `D::schema()`; there is no
//! schema resolution.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use carton::{Datum, Record, Schema, TypedReader, TypedWriter};
//! use carton::container::ContainerError;
//!
//! struct Point { x: f64, y: f64 }
//!
//! impl Datum for Point {
//!     fn schema() -> Schema {
//!         Schema::parse(r#"{"type":"record","fields":[
//!             {"name":"x","type":"float64"},
//!             {"name":"y","type":"float64"}
//!         ]}"#).expect("static schema")
//!     }
//!     fn from_record(record: Record) -> Result<Self, ContainerError> {
//!         match (record.get("x"), record.get("y")) {
//!             (Some(carton::Value::Float64(x)), Some(carton::Value::Float64(y))) => {
//!                 Ok(Point { x: *x, y: *y })
//!             }
//!             _ => Err(ContainerError::SchemaMismatch),
//!         }
//!     }
//!     fn into_record(self) -> Record {
//!         Record::new().with("x", self.x).with("y", self.y)
//!     }
//! }
//!
//! let mut writer = TypedWriter::<Point, _>::create(Vec::new(), HashMap::new())?;
//! writer.append(Point { x: 1.0, y: 2.0 })?;
//! let bytes = writer.into_inner()?;
//!
//! let mut reader = TypedReader::<Point, _>::open(std::io::Cursor::new(bytes))?;
//! let point = reader.next_datum()?;
//! # let _ = point;
//! # Ok::<(), carton::container::ContainerError>(())
//! ```

use std::collections::HashMap;
use std::io::{Read, Write};
use std::marker::PhantomData;

use crate::container::{ContainerError, ContainerReader, ContainerWriter, WriterOptions};
use crate::schema::Schema;
use crate::value::Record;

/// A native type with a fixed record shape.
///
/// Implementations come from a code generator or are written by hand;
/// either way `from_record` and `into_record` must agree with `schema()`.
pub trait Datum: Sized {
    fn schema() -> Schema;
    fn from_record(record: Record) -> Result<Self, ContainerError>;
    fn into_record(self) -> Record;
}

pub struct TypedWriter<D: Datum, W: Write> {
    inner: ContainerWriter<W>,
    _datum: PhantomData<D>,
}

impl<D: Datum, W: Write> TypedWriter<D, W> {
    pub fn create(sink: W, metadata: HashMap<String, String>) -> Result<Self, ContainerError> {
        Ok(Self {
            inner: ContainerWriter::create(D::schema(), sink, metadata)?,
            _datum: PhantomData,
        })
    }

    pub fn with_options(
        sink: W,
        metadata: HashMap<String, String>,
        opts: WriterOptions,
    ) -> Result<Self, ContainerError> {
        Ok(Self {
            inner: ContainerWriter::with_options(D::schema(), sink, metadata, opts)?,
            _datum: PhantomData,
        })
    }

    pub fn append(&mut self, datum: D) -> Result<(), ContainerError> {
        self.inner.append(&datum.into_record())
    }

    pub fn close(&mut self) -> Result<(), ContainerError> {
        self.inner.close()
    }

    pub fn into_inner(self) -> Result<W, ContainerError> {
        self.inner.into_inner()
    }
}

pub struct TypedReader<D: Datum, R: Read> {
    inner: ContainerReader<R>,
    _datum: PhantomData<D>,
}

impl<D: Datum, R: Read + std::fmt::Debug> std::fmt::Debug for TypedReader<D, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedReader").field("inner", &self.inner).finish()
    }
}

impl<D: Datum, R: Read> TypedReader<D, R> {
    /// Open a container whose embedded schema exactly matches
    /// `D::schema()`; any structural difference is a
    /// [`ContainerError::SchemaMismatch`].
    pub fn open(source: R) -> Result<Self, ContainerError> {
        let inner = ContainerReader::open(source)?;
        if *inner.schema() != D::schema() {
            return Err(ContainerError::SchemaMismatch);
        }
        Ok(Self { inner, _datum: PhantomData })
    }

    pub fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        self.inner.metadata()
    }

    pub fn has_next(&mut self) -> bool {
        self.inner.has_next()
    }

    pub fn next_datum(&mut self) -> Result<D, ContainerError> {
        D::from_record(self.inner.next_record()?)
    }
}

impl<D: Datum, R: Read> Iterator for TypedReader<D, R> {
    type Item = Result<D, ContainerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            Some(self.next_datum())
        } else {
            None
        }
    }
}
