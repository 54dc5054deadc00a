use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Reads `key` from a response object, treating absent, `null`, and
/// wrongly-typed values alike as missing.
pub fn lenient_field<T: DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Option<T> {
    match object.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::debug!(field = key, error = %err, "ignoring malformed response field");
                None
            }
        },
    }
}

/// Like [`lenient_field`] but also treats an empty string as missing.
pub fn non_empty_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    lenient_field::<String>(object, key).filter(|value| !value.is_empty())
}

pub fn nested_object<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    object.get(key).and_then(Value::as_object)
}

/// Accepts strings, numbers, and booleans as text; `null` becomes empty.
pub fn string_like<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn missing_null_and_mistyped_are_absent() {
        let map = object(json!({ "a": null, "b": "seven", "c": 7 }));
        assert_eq!(lenient_field::<u32>(&map, "a"), None);
        assert_eq!(lenient_field::<u32>(&map, "b"), None);
        assert_eq!(lenient_field::<u32>(&map, "c"), Some(7));
        assert_eq!(lenient_field::<u32>(&map, "d"), None);
    }

    #[test]
    fn empty_strings_are_absent() {
        let map = object(json!({ "name": "", "other": "x" }));
        assert_eq!(non_empty_string(&map, "name"), None);
        assert_eq!(non_empty_string(&map, "other").as_deref(), Some("x"));
    }
}
