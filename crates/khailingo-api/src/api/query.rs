//! Query-string serialization for GET parameters

use serde::Serialize;
use serde_json::Value;

use super::error::ApiError;

/// Serializes flat parameters into a percent-encoded `key=value&...` string
///
/// `params` must serialize to a JSON object. Null values (`None` fields) and
/// empty strings are skipped. Nested arrays and objects are not expanded; they
/// are sent as compact JSON text.
pub fn to_query_string<Q: Serialize + ?Sized>(params: &Q) -> Result<String, ApiError> {
    let value = serde_json::to_value(params)
        .map_err(|e| ApiError::encode(format!("Failed to serialize query parameters: {e}")))?;

    let map = match value {
        Value::Object(map) => map,
        Value::Null => return Ok(String::new()),
        other => {
            return Err(ApiError::encode(format!(
                "Query parameters must be an object, got {other}"
            )))
        }
    };

    let pairs: Vec<String> = map
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) if s.is_empty() => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&text)
            ))
        })
        .collect();

    Ok(pairs.join("&"))
}
