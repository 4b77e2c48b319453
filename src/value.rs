//! Dynamic representation of decoded values and assembled rows.
use indexmap::IndexMap;

/// The time resolution of a decoded timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Millisecond,
    Microsecond,
    Nanosecond,
}

/// A decoded value.
///
/// Physical decoding produces the variants matching the column's physical
/// type; the logical conversion pass may rewrite them (e.g. `Bytes` into
/// `Utf8` for STRING columns, `Int32` into `Date` for DATE columns).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    Utf8(String),
    /// An unscaled integer together with the scale declared by the column.
    Decimal {
        unscaled: i128,
        scale: i32,
    },
    /// Days since the unix epoch.
    Date(i32),
    /// Elapsed time since the unix epoch in the declared unit.
    Timestamp {
        value: i64,
        unit: TimeUnit,
    },
    /// The 12-byte INTERVAL converted type.
    Interval {
        months: i32,
        days: i32,
        millis: i32,
    },
    Uuid([u8; 16]),
    Json(serde_json::Value),
    List(Vec<Value>),
    Record(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value as a signed integer, for `Int32`/`Int64` variants.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(value) => Some(*value as i64),
            Value::Int64(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as a string slice, for the `Utf8` variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(value) => Some(value),
            _ => None,
        }
    }

    /// The value as a list slice, for the `List` variant.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Utf8(value.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

/// One assembled record.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// A positional tuple over the requested columns.
    Tuple(Vec<Value>),
    /// A keyed map over the schema's field names.
    Object(IndexMap<String, Value>),
}

impl Row {
    /// The cell at `index`, for `Tuple` rows.
    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            Row::Tuple(values) => values.get(index),
            Row::Object(_) => None,
        }
    }

    /// The field named `name`, for `Object` rows.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Row::Tuple(_) => None,
            Row::Object(fields) => fields.get(name),
        }
    }
}
