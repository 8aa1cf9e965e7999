//! Runtime values read from domain objects during serialization.
//!
//! Domain objects expose their attributes through [`Record`]. Resources may also
//! carry resource-level [`Accessor`]s for computed fields. Both hand back [`Data`],
//! which the serializer casts into plain JSON.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

/// A value read from a domain object.
#[derive(Debug, Clone)]
pub enum Data<'a> {
    Null,
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Number(f64),
    Text(Cow<'a, str>),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    /// A nested object, serialized through a referenced resource.
    Record(&'a dyn Record),
    List(Vec<Data<'a>>),
    /// Owned JSON, treated like the equivalent borrowed data.
    Json(Value),
}

impl<'a> Data<'a> {
    pub fn record<R: Record>(object: &'a R) -> Self {
        Data::Record(object)
    }

    pub fn records<R: Record>(objects: &'a [R]) -> Self {
        Data::List(objects.iter().map(|o| Data::Record(o)).collect())
    }

    pub fn text(s: impl Into<Cow<'a, str>>) -> Self {
        Data::Text(s.into())
    }

    /// Borrow a JSON value. Objects become records and arrays become lists.
    pub fn from_json(value: &'a Value) -> Self {
        match value {
            Value::Null => Data::Null,
            Value::Bool(b) => Data::Bool(*b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Data::Integer(i),
                (None, Some(u)) => Data::Unsigned(u),
                (None, None) => Data::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Data::Text(Cow::Borrowed(s)),
            Value::Array(items) => Data::List(items.iter().map(Data::from_json).collect()),
            Value::Object(_) => Data::Record(value),
        }
    }

    /// Name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Data::Null => "null",
            Data::Bool(_) => "boolean",
            Data::Integer(_) | Data::Unsigned(_) => "integer",
            Data::Number(_) => "number",
            Data::Text(_) => "text",
            Data::Date(_) => "date",
            Data::DateTime(_) => "date-time",
            Data::Record(_) => "record",
            Data::List(_) => "list",
            Data::Json(value) => crate::types::json_type_name(value),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Data::Null | Data::Json(Value::Null))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::Text(s) => Some(s.as_ref()),
            Data::Json(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Data::Integer(n) => Some(*n),
            Data::Json(value) => value.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Data::Integer(n) => Some(*n as f64),
            Data::Unsigned(n) => Some(*n as f64),
            Data::Number(n) => Some(*n),
            Data::Json(value) => value.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Data::Bool(b) => Some(*b),
            Data::Json(value) => value.as_bool(),
            _ => None,
        }
    }
}

/// Render a date-time as ISO-8601 with millisecond precision.
pub(crate) fn format_datetime(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn format_date(value: &NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

/// Plain JSON for data that needs no resource to render. Records yield `None`.
pub(crate) fn scalar_json(data: Data<'_>) -> Option<Value> {
    let value = match data {
        Data::Null => Value::Null,
        Data::Bool(b) => Value::Bool(b),
        Data::Integer(n) => Value::from(n),
        Data::Unsigned(n) => Value::from(n),
        Data::Number(n) => Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
        Data::Text(s) => Value::String(s.into_owned()),
        Data::Date(d) => Value::String(format_date(&d)),
        Data::DateTime(dt) => Value::String(format_datetime(&dt)),
        Data::Record(_) => return None,
        Data::List(items) => Value::Array(
            items
                .into_iter()
                .map(scalar_json)
                .collect::<Option<Vec<_>>>()?,
        ),
        Data::Json(value) => value,
    };
    Some(value)
}

impl From<bool> for Data<'_> {
    fn from(b: bool) -> Self {
        Data::Bool(b)
    }
}

impl From<i64> for Data<'_> {
    fn from(n: i64) -> Self {
        Data::Integer(n)
    }
}

impl From<i32> for Data<'_> {
    fn from(n: i32) -> Self {
        Data::Integer(n.into())
    }
}

impl From<u32> for Data<'_> {
    fn from(n: u32) -> Self {
        Data::Integer(n.into())
    }
}

impl From<u64> for Data<'_> {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Data::Unsigned(n), Data::Integer)
    }
}

impl From<f64> for Data<'_> {
    fn from(n: f64) -> Self {
        Data::Number(n)
    }
}

impl<'a> From<&'a str> for Data<'a> {
    fn from(s: &'a str) -> Self {
        Data::Text(Cow::Borrowed(s))
    }
}

impl<'a> From<&'a String> for Data<'a> {
    fn from(s: &'a String) -> Self {
        Data::Text(Cow::Borrowed(s.as_str()))
    }
}

impl From<String> for Data<'_> {
    fn from(s: String) -> Self {
        Data::Text(Cow::Owned(s))
    }
}

impl From<NaiveDate> for Data<'_> {
    fn from(d: NaiveDate) -> Self {
        Data::Date(d)
    }
}

impl From<DateTime<Utc>> for Data<'_> {
    fn from(dt: DateTime<Utc>) -> Self {
        Data::DateTime(dt.into())
    }
}

impl From<DateTime<FixedOffset>> for Data<'_> {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Data::DateTime(dt)
    }
}

impl From<Value> for Data<'_> {
    fn from(value: Value) -> Self {
        Data::Json(value)
    }
}

impl<'a, T: Into<Data<'a>>> From<Option<T>> for Data<'a> {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Data::Null)
    }
}

impl<'a, T: Into<Data<'a>>> From<Vec<T>> for Data<'a> {
    fn from(items: Vec<T>) -> Self {
        Data::List(items.into_iter().map(Into::into).collect())
    }
}

/// A domain object that can be serialized through a resource.
///
/// Attribute lookup is tried in order: a resource-level [`Accessor`], then
/// [`Record::get`], then the boolean [`Record::predicate`]. `Debug` output is
/// used in error messages when no lookup succeeds.
pub trait Record: fmt::Debug {
    /// Direct attribute accessor.
    fn get(&self, name: &str) -> Option<Data<'_>>;

    /// Boolean predicate accessor, for attributes exposed as `name?`.
    fn predicate(&self, name: &str) -> Option<bool> {
        let _ = name;
        None
    }
}

impl Record for Value {
    fn get(&self, name: &str) -> Option<Data<'_>> {
        self.as_object().and_then(|map| Record::get(map, name))
    }

    fn predicate(&self, name: &str) -> Option<bool> {
        self.as_object().and_then(|map| map.predicate(name))
    }
}

impl Record for Map<String, Value> {
    fn get(&self, name: &str) -> Option<Data<'_>> {
        Map::get(self, name).map(Data::from_json)
    }

    fn predicate(&self, name: &str) -> Option<bool> {
        Map::get(self, &format!("{}?", name)).and_then(Value::as_bool)
    }
}

/// Resource-level accessor for computed fields.
pub trait Accessor: Send + Sync {
    fn read<'a>(&self, object: &'a dyn Record, context: &Context) -> Option<Data<'a>>;
}

/// Accessor backed by a closure producing owned data.
pub(crate) struct ComputedFn<F>(pub(crate) F);

impl<F> Accessor for ComputedFn<F>
where
    F: Fn(&dyn Record, &Context) -> Data<'static> + Send + Sync,
{
    fn read<'a>(&self, object: &'a dyn Record, context: &Context) -> Option<Data<'a>> {
        Some((self.0)(object, context))
    }
}

/// Caller-supplied ambient data threaded unchanged through nested serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}
