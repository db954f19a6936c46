//! Field readers for raw payloads
//!
//! Payloads are `serde_json::Value` trees. These helpers read one field and
//! map absence or type mismatch to `None` (or a `DomainError` for required ids).

use serde_json::Value;

use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Read a required snowflake field
pub fn require_id(
    raw: &Value,
    model: &'static str,
    field: &'static str,
) -> Result<Snowflake, DomainError> {
    let value = raw
        .get(field)
        .ok_or(DomainError::MissingField { model, field })?;
    Snowflake::from_value(value).ok_or(DomainError::InvalidField { model, field })
}

/// Read an optional snowflake field (`null` counts as absent)
pub fn opt_id(raw: &Value, field: &str) -> Option<Snowflake> {
    raw.get(field).and_then(Snowflake::from_value)
}

/// Read a list of snowflakes, skipping malformed entries
pub fn id_list(raw: &Value, field: &str) -> Option<Vec<Snowflake>> {
    raw.get(field)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Snowflake::from_value).collect())
}

pub fn string(raw: &Value, field: &str) -> Option<String> {
    raw.get(field).and_then(Value::as_str).map(str::to_owned)
}

pub fn boolean(raw: &Value, field: &str) -> Option<bool> {
    raw.get(field).and_then(Value::as_bool)
}

pub fn int(raw: &Value, field: &str) -> Option<i64> {
    raw.get(field).and_then(Value::as_i64)
}

/// Read an unsigned integer that may be sent as a number or a numeric string
/// (permission bitsets are strings on newer API versions).
pub fn bits(raw: &Value, field: &str) -> Option<u64> {
    match raw.get(field)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Returns true if the field key is present at all, even when `null`
pub fn has(raw: &Value, field: &str) -> bool {
    raw.get(field).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_id() {
        let raw = json!({"id": "10", "bad": true});
        assert_eq!(require_id(&raw, "user", "id").unwrap(), Snowflake::new(10));
        assert!(matches!(
            require_id(&raw, "user", "missing"),
            Err(DomainError::MissingField { .. })
        ));
        assert!(matches!(
            require_id(&raw, "user", "bad"),
            Err(DomainError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_bits_accepts_string_and_number() {
        let raw = json!({"a": "2048", "b": 8, "c": "x"});
        assert_eq!(bits(&raw, "a"), Some(2048));
        assert_eq!(bits(&raw, "b"), Some(8));
        assert_eq!(bits(&raw, "c"), None);
    }

    #[test]
    fn test_id_list_skips_garbage() {
        let raw = json!({"roles": ["1", null, "2"]});
        assert_eq!(
            id_list(&raw, "roles"),
            Some(vec![Snowflake::new(1), Snowflake::new(2)])
        );
    }
}
