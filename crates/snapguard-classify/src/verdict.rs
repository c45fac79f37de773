//! Tolerant parsing of the engine's result document.
//!
//! The engine's output shape varies with its pipeline version: the verdict
//! fields may sit at the top level or be wrapped under envelope keys such as
//! `main_stuff`, `result`, or `content`. The parser searches the document
//! for the object carrying the verdict fields and coerces lenient scalar
//! encodings. Absent required fields produce MalformedVerdict, never a
//! panic.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use snapguard_core::types::Verdict;

use crate::ClassifyError;

/// Extract a Verdict from an engine result document.
pub fn parse_verdict(value: &Value) -> Result<Verdict, ClassifyError> {
    let obj = find_verdict_object(value).ok_or_else(|| {
        ClassifyError::MalformedVerdict("no object with verdict fields found".to_string())
    })?;

    let classification = obj
        .get("classification")
        .and_then(coerce_string)
        .ok_or_else(|| missing("classification"))?;

    let sensitivity_rating = obj
        .get("sensitivity_rating")
        .and_then(coerce_int)
        .ok_or_else(|| missing("sensitivity_rating"))?;

    let should_be_deleted = obj
        .get("should_be_deleted")
        .and_then(coerce_bool)
        .ok_or_else(|| missing("should_be_deleted"))?;

    let deletion_date = obj.get("deletion_date").and_then(coerce_date);

    let reasoning = obj
        .get("reasoning")
        .and_then(coerce_string)
        .unwrap_or_default();

    Ok(Verdict {
        classification,
        sensitivity_rating,
        should_be_deleted,
        deletion_date,
        reasoning,
    })
}

fn missing(field: &str) -> ClassifyError {
    ClassifyError::MalformedVerdict(format!("missing field '{}'", field))
}

/// Depth-first search for the object that carries the verdict fields.
fn find_verdict_object(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => {
            if map.contains_key("classification") && map.contains_key("sensitivity_rating") {
                return Some(map);
            }
            map.values().find_map(find_verdict_object)
        }
        Value::Array(items) => items.iter().find_map(find_verdict_object),
        _ => None,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS`, or a bare date
/// (interpreted as midnight UTC).
fn coerce_date(value: &Value) -> Option<DateTime<Utc>> {
    let s = match value {
        Value::String(s) => s.trim(),
        _ => return None,
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Utc.from_local_datetime(&naive).single();
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Utc
            .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
            .single();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_verdict() {
        let value = json!({
            "classification": "confidential",
            "sensitivity_rating": 9,
            "should_be_deleted": true,
            "deletion_date": "2026-08-07T12:00:00Z",
            "reasoning": "API keys visible"
        });
        let verdict = parse_verdict(&value).unwrap();
        assert_eq!(verdict.classification, "confidential");
        assert_eq!(verdict.sensitivity_rating, 9);
        assert!(verdict.should_be_deleted);
        assert!(verdict.deletion_date.is_some());
        assert_eq!(verdict.reasoning, "API keys visible");
    }

    #[test]
    fn test_nested_under_envelope() {
        let value = json!({
            "main_stuff": {
                "assessment": {
                    "classification": "internal",
                    "sensitivity_rating": 6,
                    "should_be_deleted": false,
                    "reasoning": "Dashboard screenshot"
                }
            }
        });
        let verdict = parse_verdict(&value).unwrap();
        assert_eq!(verdict.classification, "internal");
        assert_eq!(verdict.sensitivity_rating, 6);
        assert!(!verdict.should_be_deleted);
        assert!(verdict.deletion_date.is_none());
    }

    #[test]
    fn test_nested_inside_array() {
        let value = json!({
            "results": [
                {"meta": "noise"},
                {
                    "classification": "public",
                    "sensitivity_rating": 0,
                    "should_be_deleted": false,
                    "reasoning": ""
                }
            ]
        });
        let verdict = parse_verdict(&value).unwrap();
        assert_eq!(verdict.classification, "public");
    }

    #[test]
    fn test_missing_required_field_is_malformed() {
        let value = json!({
            "classification": "internal",
            "sensitivity_rating": 6
            // should_be_deleted absent
        });
        let err = parse_verdict(&value).unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedVerdict(_)));
        assert!(err.to_string().contains("should_be_deleted"));
    }

    #[test]
    fn test_no_verdict_object_is_malformed() {
        let value = json!({"status": "ok", "data": [1, 2, 3]});
        let err = parse_verdict(&value).unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedVerdict(_)));
    }

    #[test]
    fn test_lenient_scalar_coercions() {
        let value = json!({
            "classification": "restricted",
            "sensitivity_rating": "4",
            "should_be_deleted": 1,
            "reasoning": "Schema diagram"
        });
        let verdict = parse_verdict(&value).unwrap();
        assert_eq!(verdict.sensitivity_rating, 4);
        assert!(verdict.should_be_deleted);
    }

    #[test]
    fn test_float_rating_rounds() {
        let value = json!({
            "classification": "internal",
            "sensitivity_rating": 6.7,
            "should_be_deleted": false
        });
        let verdict = parse_verdict(&value).unwrap();
        assert_eq!(verdict.sensitivity_rating, 7);
    }

    #[test]
    fn test_date_only_deletion_date() {
        let value = json!({
            "classification": "confidential",
            "sensitivity_rating": 8,
            "should_be_deleted": true,
            "deletion_date": "2026-08-07"
        });
        let verdict = parse_verdict(&value).unwrap();
        let date = verdict.deletion_date.unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M").to_string(), "2026-08-07 00:00");
    }

    #[test]
    fn test_naive_datetime_deletion_date() {
        let value = json!({
            "classification": "confidential",
            "sensitivity_rating": 8,
            "should_be_deleted": true,
            "deletion_date": "2026-08-07T09:30:00"
        });
        let verdict = parse_verdict(&value).unwrap();
        assert!(verdict.deletion_date.is_some());
    }

    #[test]
    fn test_null_deletion_date_is_none() {
        let value = json!({
            "classification": "public",
            "sensitivity_rating": 0,
            "should_be_deleted": false,
            "deletion_date": null
        });
        let verdict = parse_verdict(&value).unwrap();
        assert!(verdict.deletion_date.is_none());
    }

    #[test]
    fn test_unparseable_deletion_date_is_none() {
        let value = json!({
            "classification": "public",
            "sensitivity_rating": 0,
            "should_be_deleted": false,
            "deletion_date": "next tuesday"
        });
        let verdict = parse_verdict(&value).unwrap();
        assert!(verdict.deletion_date.is_none());
    }

    #[test]
    fn test_missing_reasoning_defaults_empty() {
        let value = json!({
            "classification": "public",
            "sensitivity_rating": 0,
            "should_be_deleted": false
        });
        let verdict = parse_verdict(&value).unwrap();
        assert_eq!(verdict.reasoning, "");
    }
}
