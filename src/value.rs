//! Dynamic value model: [`Value`] and [`Record`].
//!
//! A `Record` is the neutral intermediate produced by the decoder: an
//! ordered field-name → value mapping with no compile-time shape.  The
//! typed [`Datum`](crate::datum::Datum) adapter and the generic reader
//! are both views over this one representation.

/// A single field value.  Shape checking against a schema happens in the
/// encoder, not here.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Str(String),
    Boolean(bool),
    Record(Record),
    Array(Vec<Value>),
}

impl Value {
    /// Variant name matching schema tag names (error messages).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::Str(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Record(_) => "record",
            Value::Array(_) => "array",
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float64(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// Ordered field-name → value mapping.
///
/// Insertion order is preserved; `set` on an existing name replaces the
/// value in place.  A record must exactly satisfy its schema (no missing,
/// no extra fields) before it can be encoded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style `set`, for literal records in tests and call sites.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut record = Record::new().with("id", 1).with("name", "first");
        record.set("id", 2);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("id"), Some(&Value::Int32(2)));
        // Order unchanged by replacement.
        let names: Vec<&str> = record.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["id", "name"]);
    }

    #[test]
    fn conversions_pick_the_expected_variant() {
        assert_eq!(Value::from(5i32).type_name(), "int32");
        assert_eq!(Value::from(5i64).type_name(), "int64");
        assert_eq!(Value::from(0.5f64).type_name(), "float64");
        assert_eq!(Value::from("s").type_name(), "string");
        assert_eq!(Value::from(true).type_name(), "boolean");
        assert_eq!(Value::from(Record::new()).type_name(), "record");
        assert_eq!(Value::from(vec![Value::Int32(1)]).type_name(), "array");
    }
}
