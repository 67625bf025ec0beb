use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::collect::arcgis::field::FieldType;
use crate::commons::basic_functions::datetime_from_epoch_millis;

/// A single attribute value of a record
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Integer(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
}

impl AttributeValue {
    /// Type a raw JSON attribute using the column's declared type
    ///
    /// Values that do not fit the declared type fall back to their JSON shape
    /// rather than failing the whole query.
    pub fn from_json(value: &Value, field_type: &FieldType) -> Self {
        if value.is_null() {
            return AttributeValue::Null;
        }

        let typed = match field_type {
            FieldType::ObjectId | FieldType::Integer => value.as_i64().map(AttributeValue::Integer),
            FieldType::Double => value.as_f64().map(AttributeValue::Double),
            FieldType::Date => value
                .as_i64()
                .and_then(datetime_from_epoch_millis)
                .map(AttributeValue::Date),
            FieldType::String | FieldType::Guid => {
                value.as_str().map(|s| AttributeValue::String(s.to_string()))
            }
            FieldType::Other(_) => None,
        };

        typed.unwrap_or_else(|| Self::from_json_untyped(value))
    }

    /// Type a raw JSON attribute from its JSON shape alone
    pub fn from_json_untyped(value: &Value) -> Self {
        match value {
            Value::Null => AttributeValue::Null,
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Integer(i),
                None => n
                    .as_f64()
                    .map(AttributeValue::Double)
                    .unwrap_or_else(|| AttributeValue::String(n.to_string())),
            },
            Value::String(s) => AttributeValue::String(s.clone()),
            Value::Bool(b) => AttributeValue::String(b.to_string()),
            other => AttributeValue::String(other.to_string()),
        }
    }

    /// JSON form used for GeoJSON properties; dates become RFC 3339 strings
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Null => Value::Null,
            AttributeValue::Integer(i) => Value::from(*i),
            AttributeValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttributeValue::String(s) => Value::String(s.clone()),
            AttributeValue::Date(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            AttributeValue::Date(dt) => Some(dt),
            _ => None,
        }
    }
}

/// Table-cell rendering: `Null` is empty
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Double(d) => write!(f, "{}", d),
            AttributeValue::String(s) => write!(f, "{}", s),
            AttributeValue::Date(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Integer(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(d: f64) -> Self {
        AttributeValue::Double(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_conversion() {
        assert_eq!(
            AttributeValue::from_json(&json!(65), &FieldType::Integer),
            AttributeValue::Integer(65)
        );
        assert_eq!(
            AttributeValue::from_json(&json!(65), &FieldType::Double),
            AttributeValue::Double(65.0)
        );
        assert_eq!(
            AttributeValue::from_json(&json!("Djoungou"), &FieldType::String),
            AttributeValue::String("Djoungou".to_string())
        );
        assert_eq!(
            AttributeValue::from_json(&json!(null), &FieldType::Date),
            AttributeValue::Null
        );
    }

    #[test]
    fn test_date_from_epoch_millis() {
        let value = AttributeValue::from_json(&json!(1_550_642_400_000_i64), &FieldType::Date);
        assert_eq!(value.to_string(), "2019-02-20T06:00:00Z");
        assert!(value.as_date().is_some());
    }

    #[test]
    fn test_mismatched_value_falls_back() {
        // DateOnly fields are delivered as strings
        assert_eq!(
            AttributeValue::from_json(&json!("2019-02-20"), &FieldType::Date),
            AttributeValue::String("2019-02-20".to_string())
        );
        assert_eq!(
            AttributeValue::from_json(&json!(2.5), &FieldType::Integer),
            AttributeValue::Double(2.5)
        );
    }

    #[test]
    fn test_to_json_and_display() {
        assert_eq!(AttributeValue::Null.to_json(), json!(null));
        assert_eq!(AttributeValue::Null.to_string(), "");
        assert_eq!(AttributeValue::Double(f64::NAN).to_json(), json!(null));
        assert_eq!(AttributeValue::from(3_i64).as_f64(), Some(3.0));
        assert_eq!(AttributeValue::from("x").as_str(), Some("x"));
    }
}
