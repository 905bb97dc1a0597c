//! Scalar coercion for configuration fields.
//!
//! YAML, environment variables and `--set` overrides disagree on types:
//! `no_reset: true`, `HANDSET__FRAMEWORK__DEVICE__NO_RESET=yes` and
//! `--set framework.device.no_reset=true` must all land as the same `bool`.

use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(super) fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!("expected a string, got {other}"))),
    }
}

/// Blank strings count as unset
pub(super) fn optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = text(deserializer)?;
    let trimmed = value.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

pub(super) fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => parse_bool(&s)
            .ok_or_else(|| D::Error::custom(format!("must be true or false, got '{s}'"))),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        other => Err(D::Error::custom(format!("must be true or false, got {other}"))),
    }
}

pub(super) fn unsigned<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_u64().map(|u| u as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    let number =
        parsed.ok_or_else(|| D::Error::custom(format!("must be an integer, got {value}")))?;
    u64::try_from(number)
        .map_err(|_| D::Error::custom(format!("must not be negative, got {number}")))
}

pub(super) fn optional_unsigned<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if matches!(&value, Value::String(s) if s.trim().is_empty()) {
        return Ok(None);
    }
    unsigned(value).map(Some).map_err(D::Error::custom)
}

pub(super) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Fields {
        #[serde(deserialize_with = "flag")]
        on: bool,
        #[serde(deserialize_with = "unsigned")]
        secs: u64,
        #[serde(default, deserialize_with = "optional_text")]
        name: Option<String>,
    }

    fn parse(value: Value) -> Result<Fields, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_strings_coerce_to_scalars() {
        let parsed = parse(json!({"on": "Yes", "secs": " 17 ", "name": 14})).unwrap();
        assert!(parsed.on);
        assert_eq!(parsed.secs, 17);
        assert_eq!(parsed.name.as_deref(), Some("14"));
    }

    #[test]
    fn test_blank_text_is_unset() {
        let parsed = parse(json!({"on": false, "secs": 1, "name": "   "})).unwrap();
        assert_eq!(parsed.name, None);
    }

    #[test]
    fn test_bad_scalars_are_rejected() {
        let err = parse(json!({"on": "maybe", "secs": 1})).unwrap_err();
        assert!(err.to_string().contains("true or false"));
        let err = parse(json!({"on": true, "secs": "-5"})).unwrap_err();
        assert!(err.to_string().contains("negative"));
        let err = parse(json!({"on": true, "secs": "twelve"})).unwrap_err();
        assert!(err.to_string().contains("integer"));
    }
}
