//! Typed field extraction from JSON objects.
//!
//! A field can be absent (not an error), present with the wrong type
//! (`InvalidArgument`), or present and decodable.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::BackendError;

/// Parse `text` as a JSON object.
///
/// Malformed JSON is `InvalidEncoding`; a valid document whose root is not
/// an object is `InvalidArgument`. `what` names the document in the log.
pub fn parse_object(text: &str, what: &str) -> Result<Map<String, Value>, BackendError> {
    let document: Value = serde_json::from_str(text)
        .map_err(|e| BackendError::invalid_encoding(format!("Parse {what} error: {e}")))?;
    match document {
        Value::Object(object) => Ok(object),
        other => Err(BackendError::invalid_argument(format!(
            "The {what} is not an object: found {}",
            type_name(&other)
        ))),
    }
}

/// Look up `key` and decode it as `T`.
///
/// Returns `Ok(None)` when the key is absent.
pub fn get_option<'de, T>(
    object: &'de Map<String, Value>,
    key: &str,
) -> Result<Option<T>, BackendError>
where
    T: Deserialize<'de>,
{
    let Some(value) = object.get(key) else {
        return Ok(None);
    };
    T::deserialize(value).map(Some).map_err(|e| {
        BackendError::invalid_argument(format!("Unable to retrieve the \"{key}\" option: {e}"))
    })
}

/// Assign `result` when `key` is present, leave it untouched otherwise.
pub fn get_optional_option<'de, T>(
    object: &'de Map<String, Value>,
    key: &str,
    result: &mut Option<T>,
) -> Result<(), BackendError>
where
    T: Deserialize<'de>,
{
    get_optional_option_as(object, key, result, |value: T| value)
}

/// Like [`get_optional_option`], decoding as `U` and storing as `T`.
///
/// Used where the JSON type is wider than the stored type, e.g. numbers
/// decoded as `f64` and kept as `f32`.
pub fn get_optional_option_as<'de, U, T>(
    object: &'de Map<String, Value>,
    key: &str,
    result: &mut Option<T>,
    convert: impl FnOnce(U) -> T,
) -> Result<(), BackendError>
where
    U: Deserialize<'de>,
{
    if let Some(value) = get_option::<U>(object, key)? {
        *result = Some(convert(value));
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn absent_key_is_not_an_error() {
        let obj = object(json!({}));
        assert_eq!(get_option::<i64>(&obj, "speaker").unwrap(), None);
    }

    #[test]
    fn present_key_decodes() {
        let obj = object(json!({"speaker": 3, "model": "voice.onnx"}));
        assert_eq!(get_option::<i64>(&obj, "speaker").unwrap(), Some(3));
        assert_eq!(
            get_option::<&str>(&obj, "model").unwrap(),
            Some("voice.onnx")
        );
    }

    #[test]
    fn wrong_type_is_invalid_argument() {
        let obj = object(json!({"speaker": "three", "json_input": 1}));
        assert!(matches!(
            get_option::<i64>(&obj, "speaker"),
            Err(BackendError::InvalidArgument(_))
        ));
        assert!(matches!(
            get_option::<bool>(&obj, "json_input"),
            Err(BackendError::InvalidArgument(_))
        ));
    }

    #[test]
    fn fractional_number_is_not_an_integer() {
        let obj = object(json!({"speaker": 1.5}));
        assert!(get_option::<i64>(&obj, "speaker").is_err());
    }

    #[test]
    fn optional_option_keeps_value_when_absent() {
        let obj = object(json!({}));
        let mut speaker = Some(7i64);
        get_optional_option(&obj, "speaker", &mut speaker).unwrap();
        assert_eq!(speaker, Some(7));
    }

    #[test]
    fn narrowing_accepts_integers_as_doubles() {
        let obj = object(json!({"noise_scale": 1}));
        let mut noise: Option<f32> = None;
        get_optional_option_as(&obj, "noise_scale", &mut noise, |v: f64| v as f32).unwrap();
        assert_eq!(noise, Some(1.0));
    }

    #[test]
    fn parse_object_distinguishes_encoding_from_shape() {
        assert!(matches!(
            parse_object("{not json", "run config"),
            Err(BackendError::InvalidEncoding(_))
        ));
        assert!(matches!(
            parse_object("[1, 2]", "run config"),
            Err(BackendError::InvalidArgument(_))
        ));
        assert!(parse_object(r#"{"a": 1}"#, "run config").is_ok());
    }
}
