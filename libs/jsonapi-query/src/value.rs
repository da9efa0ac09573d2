//! Attribute value kinds, record identifiers and their wire formatting.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Number, Value};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Declared kind of an attribute. Drives normalization of incoming values and
/// formatting of outgoing ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    Json,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::String => write!(f, "string"),
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::Boolean => write!(f, "boolean"),
            ValueKind::Date => write!(f, "date"),
            ValueKind::DateTime => write!(f, "date_time"),
            ValueKind::Time => write!(f, "time"),
            ValueKind::Json => write!(f, "json"),
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

fn parse_date_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            parse_date(s)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(s, f).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.time()))
}

fn render_date_time(dt: &DateTime<Utc>) -> Value {
    Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl ValueKind {
    /// Normalize an incoming value into the stored representation.
    ///
    /// `null` is accepted for every kind; presence rules belong to the repository.
    /// Returns `None` when the value cannot represent this kind.
    #[must_use]
    pub fn normalize(self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match (self, value) {
            (ValueKind::Json, v) => Some(v.clone()),
            (ValueKind::String, Value::String(_)) => Some(value.clone()),
            (ValueKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (ValueKind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (ValueKind::Integer, Value::Number(n)) => n.as_i64().map(Value::from),
            (ValueKind::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (ValueKind::Float, Value::Number(n)) => {
                n.as_f64().and_then(Number::from_f64).map(Value::Number)
            }
            (ValueKind::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            (ValueKind::Boolean, Value::Bool(_)) => Some(value.clone()),
            (ValueKind::Boolean, Value::String(s)) => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (ValueKind::Date, Value::String(s)) => {
                parse_date(s).map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            }
            (ValueKind::DateTime, Value::String(s)) => {
                parse_date_time(s).map(|dt| render_date_time(&dt))
            }
            (ValueKind::Time, Value::String(s)) => {
                parse_time(s).map(|t| Value::String(t.format("%H:%M:%S").to_string()))
            }
            _ => None,
        }
    }

    /// Format a stored value for the wire. Values that do not parse as this kind
    /// are passed through untouched.
    ///
    /// Times are emitted as a bare `HH:MM:SS`, without a placeholder date.
    #[must_use]
    pub fn format(self, value: &Value) -> Value {
        match (self, value) {
            (ValueKind::Date | ValueKind::DateTime | ValueKind::Time, Value::String(_)) => {
                self.normalize(value).unwrap_or_else(|| value.clone())
            }
            _ => value.clone(),
        }
    }
}

/// Per-attribute replacement for the kind's default formatting.
pub trait ValueFormatter: Send + Sync + fmt::Debug {
    /// Stored value to wire value.
    fn format(&self, value: &Value) -> Value;

    /// Wire value to stored value; `None` rejects the value.
    fn unformat(&self, value: &Value) -> Option<Value>;
}

/// Declared kind of a resource's primary key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    #[default]
    Integer,
    String,
}

impl IdKind {
    /// Parse one segment of an id list.
    #[must_use]
    pub fn parse(self, raw: &str) -> Option<ResourceId> {
        let raw = raw.trim();
        match self {
            IdKind::Integer => raw.parse::<i64>().ok().map(ResourceId::Int),
            IdKind::String if raw.is_empty() => None,
            IdKind::String => Some(ResourceId::Str(raw.to_owned())),
        }
    }

    /// Read an id from a JSON payload value (number or string).
    #[must_use]
    pub fn from_json(self, value: &Value) -> Option<ResourceId> {
        match (self, value) {
            (IdKind::Integer, Value::Number(n)) => n.as_i64().map(ResourceId::Int),
            (IdKind::String, Value::Number(n)) => Some(ResourceId::Str(n.to_string())),
            (_, Value::String(s)) => self.parse(s),
            _ => None,
        }
    }
}

/// Primary key value of a record. Always rendered as a string on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceId {
    Int(i64),
    Str(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Int(i) => write!(f, "{i}"),
            ResourceId::Str(s) => f.write_str(s),
        }
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        ResourceId::Int(id)
    }
}

impl From<i32> for ResourceId {
    fn from(id: i32) -> Self {
        ResourceId::Int(i64::from(id))
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        ResourceId::Str(id.to_owned())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        ResourceId::Str(id)
    }
}
