//! Identifier newtypes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::ParseError;

/// Identifier of a task owned by the backend.
///
/// The REST API issues integers (`"task_id": 42`), but the channel treats the
/// identifier as opaque: any other string or number is kept as text. Integral
/// values are normalised to [`TaskId::Int`] whether they arrive as `42`,
/// `42.0` or `"42"`, so they compare equal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum TaskId {
    /// Integer identifier.
    Int(i64),
    /// Any other identifier, kept verbatim.
    Text(String),
}

impl TaskId {
    /// Wrap an integer identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self::Int(id)
    }

    /// Wrap a textual identifier, normalising integral text.
    #[must_use]
    pub fn text(id: impl Into<String>) -> Self {
        let id = id.into();
        match id.trim().parse::<i64>() {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Text(id),
        }
    }

    /// The integer form, if this is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// Read an identifier from a JSON value.
    ///
    /// Numbers and non-blank strings are accepted; `null`, booleans, arrays,
    /// objects and blank strings are not.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(
                n.as_i64()
                    .or_else(|| n.as_f64().and_then(integral))
                    .map_or_else(|| Self::Text(n.to_string()), Self::Int),
            ),
            Value::String(s) if !s.trim().is_empty() => Some(Self::text(s.as_str())),
            _ => None,
        }
    }

    /// The JSON value sent on the wire.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(n) => Value::from(*n),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn integral(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then(|| f as i64)
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl FromStr for TaskId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::InvalidTaskId(s.to_owned()));
        }
        Ok(Self::text(s))
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid task_id: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_as_bare_integer() {
        let json = serde_json::to_string(&TaskId::new(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn text_serializes_as_string() {
        let json = serde_json::to_string(&TaskId::text("a1b2-uuid")).unwrap();
        assert_eq!(json, r#""a1b2-uuid""#);
    }

    #[test]
    fn deserializes_from_integer() {
        let id: TaskId = serde_json::from_str("7").unwrap();
        assert_eq!(id.as_int(), Some(7));
    }

    #[test]
    fn integral_forms_compare_equal() {
        assert_eq!(TaskId::from_value(&json!(42)), Some(TaskId::new(42)));
        assert_eq!(TaskId::from_value(&json!(42.0)), Some(TaskId::new(42)));
        assert_eq!(TaskId::from_value(&json!("42")), Some(TaskId::new(42)));
    }

    #[test]
    fn opaque_values_are_kept_as_text() {
        assert_eq!(
            TaskId::from_value(&json!("a1b2-uuid")),
            Some(TaskId::Text("a1b2-uuid".into()))
        );
        assert_eq!(
            TaskId::from_value(&json!(1.5)),
            Some(TaskId::Text("1.5".into()))
        );
        assert_eq!(
            TaskId::from_value(&json!(u64::MAX)),
            Some(TaskId::Text(u64::MAX.to_string()))
        );
    }

    #[test]
    fn non_identifiers_are_refused() {
        for value in [json!(null), json!(true), json!([1]), json!({"id": 1}), json!("  ")] {
            assert_eq!(TaskId::from_value(&value), None, "{value}");
        }
        assert!(serde_json::from_str::<TaskId>("true").is_err());
    }

    #[test]
    fn parses_from_cli_string() {
        assert_eq!(" 13 ".parse::<TaskId>().unwrap(), TaskId::new(13));
        assert_eq!("abc".parse::<TaskId>().unwrap(), TaskId::Text("abc".into()));
        assert!("  ".parse::<TaskId>().is_err());
    }

    #[test]
    fn display_is_raw_value() {
        assert_eq!(TaskId::from(99).to_string(), "99");
        assert_eq!(TaskId::text("job-7").to_string(), "job-7");
    }

    #[test]
    fn wire_value_keeps_kind() {
        assert_eq!(TaskId::new(5).to_value(), json!(5));
        assert_eq!(TaskId::text("x").to_value(), json!("x"));
    }

    #[test]
    fn ordering_follows_inner_value() {
        assert!(TaskId::new(1) < TaskId::new(2));
    }
}
