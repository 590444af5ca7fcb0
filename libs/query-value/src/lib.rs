mod arg_type;
mod error;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::prelude::*;
use indexmap::IndexMap;
use serde::{Serialize, ser::Serializer};
use std::fmt;

pub use arg_type::ArgType;
pub use error::ConversionFailure;

pub type QueryValueResult<T> = std::result::Result<T, ConversionFailure>;
pub type QueryListValue = Vec<QueryValue>;
pub type QueryObjectValue = IndexMap<String, QueryValue>;

/// A scalar or structured value travelling through the engine: filter literals, mutation data,
/// positional statement arguments and the cells of a result set all use this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),

    #[serde(serialize_with = "serialize_date")]
    DateTime(DateTime<FixedOffset>),

    /// A JSON document bound as a single argument.
    Json(serde_json::Value),

    #[serde(serialize_with = "serialize_bytes")]
    Bytes(Vec<u8>),

    List(QueryListValue),

    /// A collection of key-value pairs, in insertion order.
    Object(QueryObjectValue),
}

/// Stringify a date to the following format
/// 1999-05-01T00:00:00.000Z
pub fn stringify_datetime(datetime: &DateTime<FixedOffset>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 date and time string such as 1996-12-19T16:39:57-08:00,
/// then returns a new DateTime with a parsed FixedOffset.
pub fn parse_datetime(datetime: &str) -> chrono::ParseResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(datetime)
}

/// Lenient ISO 8601 parsing for values coming back from a database driver.
///
/// Accepts RFC 3339 timestamps, naive timestamps with either a `T` or a space separator
/// (interpreted as UTC) and plain dates (midnight UTC).
pub fn parse_iso8601(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    // Offsets without a colon (`+0200`), as emitted by some MySQL drivers.
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%z") {
        return Some(dt);
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_bytes(s: &str) -> QueryValueResult<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|_| ConversionFailure::new("base64 encoded bytes", "QueryValue::Bytes"))
}

fn serialize_date<S>(date: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    stringify_datetime(date).serialize(serializer)
}

fn serialize_bytes<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    encode_bytes(bytes).serialize(serializer)
}

impl QueryValue {
    pub fn json(value: serde_json::Value) -> Self {
        QueryValue::Json(value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            QueryValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QueryValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[QueryValue]> {
        match self {
            QueryValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&QueryObjectValue> {
        match self {
            QueryValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            QueryValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<QueryListValue> {
        match self {
            QueryValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<QueryObjectValue> {
        match self {
            QueryValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The argument type tag a driver uses to bind this value.
    pub fn arg_type(&self) -> ArgType {
        ArgType::of(self)
    }

    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryValue::Null => "null",
            QueryValue::Boolean(_) => "boolean",
            QueryValue::Int(_) => "int",
            QueryValue::Float(_) => "float",
            QueryValue::String(_) => "string",
            QueryValue::DateTime(_) => "datetime",
            QueryValue::Json(_) => "json",
            QueryValue::Bytes(_) => "bytes",
            QueryValue::List(_) => "list",
            QueryValue::Object(_) => "object",
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Null => "null".fmt(f),
            QueryValue::Boolean(x) => x.fmt(f),
            QueryValue::Int(x) => x.fmt(f),
            QueryValue::Float(x) => x.fmt(f),
            QueryValue::String(x) => x.fmt(f),
            QueryValue::DateTime(x) => stringify_datetime(x).fmt(f),
            QueryValue::Json(x) => x.fmt(f),
            QueryValue::Bytes(b) => encode_bytes(b).fmt(f),
            QueryValue::List(x) => {
                let joined = x.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                write!(f, "[{joined}]")
            }
            QueryValue::Object(pairs) => {
                let joined = pairs
                    .iter()
                    .map(|(key, value)| format!(r#""{key}": {value}"#))
                    .collect::<Vec<_>>()
                    .join(", ");

                write!(f, "{{ {joined} }}")
            }
        }
    }
}

impl From<serde_json::Value> for QueryValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => QueryValue::Null,
            serde_json::Value::Bool(b) => QueryValue::Boolean(b),
            serde_json::Value::Number(num) => match num.as_i64() {
                Some(i) => QueryValue::Int(i),
                None => QueryValue::Float(num.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => QueryValue::String(s),
            serde_json::Value::Array(values) => QueryValue::List(values.into_iter().map(QueryValue::from).collect()),
            serde_json::Value::Object(obj) => {
                QueryValue::Object(obj.into_iter().map(|(k, v)| (k, QueryValue::from(v))).collect())
            }
        }
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::String(s.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::String(s)
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        QueryValue::Boolean(b)
    }
}

impl From<i32> for QueryValue {
    fn from(i: i32) -> Self {
        QueryValue::Int(i64::from(i))
    }
}

impl From<i64> for QueryValue {
    fn from(i: i64) -> Self {
        QueryValue::Int(i)
    }
}

impl From<u32> for QueryValue {
    fn from(i: u32) -> Self {
        QueryValue::Int(i64::from(i))
    }
}

impl From<f64> for QueryValue {
    fn from(f: f64) -> Self {
        QueryValue::Float(f)
    }
}

impl From<DateTime<FixedOffset>> for QueryValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        QueryValue::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(dt: DateTime<Utc>) -> Self {
        QueryValue::DateTime(dt.fixed_offset())
    }
}

impl From<Vec<u8>> for QueryValue {
    fn from(bytes: Vec<u8>) -> Self {
        QueryValue::Bytes(bytes)
    }
}

impl From<QueryListValue> for QueryValue {
    fn from(list: QueryListValue) -> Self {
        QueryValue::List(list)
    }
}

impl From<QueryObjectValue> for QueryValue {
    fn from(obj: QueryObjectValue) -> Self {
        QueryValue::Object(obj)
    }
}

impl<T> From<Option<T>> for QueryValue
where
    T: Into<QueryValue>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(value) => value.into(),
            None => QueryValue::Null,
        }
    }
}

impl TryFrom<QueryValue> for i64 {
    type Error = ConversionFailure;

    fn try_from(value: QueryValue) -> QueryValueResult<i64> {
        match value {
            QueryValue::Int(i) => Ok(i),
            QueryValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ConversionFailure::new("string", "i64")),
            QueryValue::Float(f) if f.fract() == 0.0 => Ok(f as i64),
            other => Err(ConversionFailure::new(other.type_name(), "i64")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn json_numbers_keep_their_integer_ness() {
        assert_eq!(QueryValue::from(json!(4)), QueryValue::Int(4));
        assert_eq!(QueryValue::from(json!(4.5)), QueryValue::Float(4.5));
    }

    #[test]
    fn iso_strings_stay_strings() {
        let value = QueryValue::from(json!("2024-01-01T00:00:00.000Z"));
        assert_eq!(value, QueryValue::String("2024-01-01T00:00:00.000Z".into()));
    }

    #[test]
    fn json_objects_preserve_key_order() {
        let value = QueryValue::from(json!({ "b": 1, "a": 2 }));
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();

        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn parse_iso8601_accepts_driver_formats() {
        let expected = parse_datetime("2023-01-01T23:59:59Z").unwrap();

        assert_eq!(parse_iso8601("2023-01-01T23:59:59Z"), Some(expected));
        assert_eq!(parse_iso8601("2023-01-01 23:59:59"), Some(expected));
        assert_eq!(parse_iso8601("2023-01-01T23:59:59.000"), Some(expected));
        assert_eq!(
            parse_iso8601("2023-01-01"),
            Some(parse_datetime("2023-01-01T00:00:00Z").unwrap())
        );
        assert_eq!(parse_iso8601("not a date"), None);
    }

    #[test]
    fn serializes_dates_with_millis() {
        let value = QueryValue::DateTime(parse_datetime("1999-05-01T00:00:00Z").unwrap());
        assert_eq!(serde_json::to_string(&value).unwrap(), r#""1999-05-01T00:00:00.000Z""#);
    }

    #[test]
    fn integer_conversion_accepts_strings() {
        assert_eq!(i64::try_from(QueryValue::from("42")).unwrap(), 42);
        assert_eq!(i64::try_from(QueryValue::Int(7)).unwrap(), 7);
        assert!(i64::try_from(QueryValue::Boolean(true)).is_err());
    }
}
