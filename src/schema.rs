//! Schema model: the structural description of a record type.
//!
//! A [`Schema`] is an ordered list of named, typed fields.  Schemas are
//! immutable once constructed and compare structurally (same field names,
//! order, and types), which is the identity used when a typed reader
//! checks a file's embedded schema against the shape it expects.
//!
//! The text form embedded in container headers is JSON:
//!
//! ```json
//! {"type":"record","fields":[
//!     {"name":"id","type":"int32"},
//!     {"name":"name","type":"string"},
//!     {"name":"tags","type":{"type":"array","items":"string"}}
//! ]}
//! ```
//!
//! Primitive tags are the strings `int32`, `int64`, `float64`, `string`
//! and `boolean`; nested records are inline record objects; arrays carry
//! their item type under `items`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("schema text is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown type tag: {0:?}")]
    UnknownType(String),
    #[error("duplicate field name: {0:?}")]
    DuplicateField(String),
    #[error("malformed schema declaration: {0}")]
    Malformed(String),
}

/// Closed set of field types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Int32,
    Int64,
    Float64,
    String,
    Boolean,
    Record(Schema),
    Array(Box<TypeTag>),
}

impl TypeTag {
    /// Tag name as written in schema text (diagnostics and error messages).
    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::Int32 => "int32",
            TypeTag::Int64 => "int64",
            TypeTag::Float64 => "float64",
            TypeTag::String => "string",
            TypeTag::Boolean => "boolean",
            TypeTag::Record(_) => "record",
            TypeTag::Array(_) => "array",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    tag: TypeTag,
}

impl Field {
    pub fn new(name: impl Into<String>, tag: TypeTag) -> Self {
        Self { name: name.into(), tag }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }
}

/// An ordered, immutable sequence of field descriptors.
///
/// No mutation API is exposed after construction; `Clone` is the only way
/// to derive one schema from another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Build a schema, rejecting duplicate field names.
    pub fn new(fields: Vec<Field>) -> Result<Self, SchemaError> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    /// Parse schema text.  The top level must be a record declaration.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let raw: RawType = serde_json::from_str(text)?;
        match resolve(raw)? {
            TypeTag::Record(schema) => Ok(schema),
            other => Err(SchemaError::Malformed(format!(
                "top-level schema must be a record, got {:?}",
                other.name()
            ))),
        }
    }

    /// The JSON text embedded in container headers.  Parsing it back
    /// yields a structurally equal schema.
    pub fn canonical_text(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string(&to_raw(&TypeTag::Record(self.clone())))?)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// Raw serde shapes for the JSON text form.  Deserialization accepts the
// superset; `resolve` turns it into a validated `TypeTag` with precise
// errors (unknown tags, duplicate fields, missing clauses).

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawType {
    Name(String),
    Complex(RawComplex),
}

#[derive(Serialize, Deserialize)]
struct RawComplex {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<RawField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Box<RawType>>,
}

#[derive(Serialize, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    tag: RawType,
}

fn resolve(raw: RawType) -> Result<TypeTag, SchemaError> {
    match raw {
        RawType::Name(name) => match name.as_str() {
            "int32" => Ok(TypeTag::Int32),
            "int64" => Ok(TypeTag::Int64),
            "float64" => Ok(TypeTag::Float64),
            "string" => Ok(TypeTag::String),
            "boolean" => Ok(TypeTag::Boolean),
            _ => Err(SchemaError::UnknownType(name)),
        },
        RawType::Complex(complex) => match complex.kind.as_str() {
            "record" => {
                let raw_fields = complex.fields.ok_or_else(|| {
                    SchemaError::Malformed("record declaration missing \"fields\"".into())
                })?;
                let mut fields = Vec::with_capacity(raw_fields.len());
                for raw_field in raw_fields {
                    fields.push(Field::new(raw_field.name, resolve(raw_field.tag)?));
                }
                Ok(TypeTag::Record(Schema::new(fields)?))
            }
            "array" => {
                let items = complex.items.ok_or_else(|| {
                    SchemaError::Malformed("array declaration missing \"items\"".into())
                })?;
                Ok(TypeTag::Array(Box::new(resolve(*items)?)))
            }
            other => Err(SchemaError::UnknownType(other.to_string())),
        },
    }
}

fn to_raw(tag: &TypeTag) -> RawType {
    match tag {
        TypeTag::Int32 => RawType::Name("int32".into()),
        TypeTag::Int64 => RawType::Name("int64".into()),
        TypeTag::Float64 => RawType::Name("float64".into()),
        TypeTag::String => RawType::Name("string".into()),
        TypeTag::Boolean => RawType::Name("boolean".into()),
        TypeTag::Record(schema) => RawType::Complex(RawComplex {
            kind: "record".into(),
            fields: Some(
                schema
                    .fields
                    .iter()
                    .map(|f| RawField { name: f.name.clone(), tag: to_raw(&f.tag) })
                    .collect(),
            ),
            items: None,
        }),
        TypeTag::Array(item) => RawType::Complex(RawComplex {
            kind: "array".into(),
            fields: None,
            items: Some(Box::new(to_raw(item))),
        }),
    }
}
