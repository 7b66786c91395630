//! Validation and normalization of reading payloads.
//!
//! A payload is a JSON object with any subset of `moisture`, `temperature`,
//! `ph`, `npk`. Values may be numbers or numeric strings; `null` is treated
//! as absent. One bad field rejects the whole payload.

use serde_json::Value;

use super::inference::FeatureVector;
use crate::db::models::ReadingFields;
use crate::errors::AppError;

/// Reading used when neither the caller nor the store supplies a value.
pub const DEFAULT_READING: FeatureVector = FeatureVector {
    moisture: 0.0,
    temperature: 0.0,
    ph: 7.0,
    npk: 120.0,
};

/// Parse a raw request body. An empty body (or a JSON `null`) yields `None`.
pub fn parse_body(body: &[u8]) -> Result<Option<ReadingFields>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Request body is not valid JSON: {}", e)))?;
    if value.is_null() {
        return Ok(None);
    }
    parse_fields(&value).map(Some)
}

/// Coerce the known measurement keys of a JSON object. Unknown keys are ignored.
pub fn parse_fields(value: &Value) -> Result<ReadingFields, AppError> {
    let map = value
        .as_object()
        .ok_or_else(|| AppError::Validation("Request body must be a JSON object".to_string()))?;

    Ok(ReadingFields {
        moisture: coerce("moisture", map.get("moisture"))?,
        temperature: coerce("temperature", map.get("temperature"))?,
        ph: coerce("ph", map.get("ph"))?,
        npk: coerce("npk", map.get("npk"))?,
    })
}

fn coerce(name: &str, value: Option<&Value>) -> Result<Option<f64>, AppError> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(AppError::Validation(format!(
            "{} must be a finite number, got {}",
            name,
            value.map(Value::to_string).unwrap_or_default()
        ))),
    }
}

/// Fill every missing field from `DEFAULT_READING`.
pub fn resolve_features(fields: ReadingFields) -> FeatureVector {
    FeatureVector {
        moisture: fields.moisture.unwrap_or(DEFAULT_READING.moisture),
        temperature: fields.temperature.unwrap_or(DEFAULT_READING.temperature),
        ph: fields.ph.unwrap_or(DEFAULT_READING.ph),
        npk: fields.npk.unwrap_or(DEFAULT_READING.npk),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_fields_numbers_and_strings() {
        let fields = parse_fields(&json!({
            "moisture": 45,
            "temperature": "24.50",
            "ph": " 6.8 ",
            "npk": 120.0
        }))
        .unwrap();
        assert_eq!(fields.moisture, Some(45.0));
        assert_eq!(fields.temperature, Some(24.5));
        assert_eq!(fields.ph, Some(6.8));
        assert_eq!(fields.npk, Some(120.0));
    }

    #[test]
    fn test_parse_fields_absent_and_null() {
        let fields = parse_fields(&json!({"moisture": null, "temperature": 21.0, "extra": "x"})).unwrap();
        assert_eq!(fields.moisture, None);
        assert_eq!(fields.temperature, Some(21.0));
        assert_eq!(fields.ph, None);
        assert_eq!(fields.npk, None);
    }

    #[test]
    fn test_parse_fields_rejects_non_numeric() {
        let err = parse_fields(&json!({"moisture": 30, "ph": "acidic"})).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("ph")));

        let err = parse_fields(&json!({"npk": true})).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("npk")));
    }

    #[test]
    fn test_parse_fields_rejects_non_finite_strings() {
        assert!(parse_fields(&json!({"moisture": "NaN"})).is_err());
        assert!(parse_fields(&json!({"moisture": "inf"})).is_err());
    }

    #[test]
    fn test_parse_fields_requires_object() {
        assert!(parse_fields(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_parse_body_empty_is_none() {
        assert_eq!(parse_body(b"").unwrap(), None);
        assert_eq!(parse_body(b"  \n").unwrap(), None);
        assert_eq!(parse_body(b"null").unwrap(), None);
        assert!(parse_body(b"{not json").is_err());
    }

    #[test]
    fn test_parse_body_empty_object_has_no_fields() {
        let fields = parse_body(b"{}").unwrap().unwrap();
        assert_eq!(fields, ReadingFields::default());
    }

    #[test]
    fn test_resolve_features_uses_defaults() {
        let features = resolve_features(ReadingFields {
            moisture: Some(30.0),
            ..Default::default()
        });
        assert_eq!(
            features,
            FeatureVector {
                moisture: 30.0,
                temperature: 0.0,
                ph: 7.0,
                npk: 120.0,
            }
        );
    }
}
