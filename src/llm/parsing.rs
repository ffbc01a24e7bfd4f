//! Response text → JSON
//!
//! Models often wrap the object in prose or a ```json fence. Everything from
//! the first `{` to the last `}` is taken as the payload.

/// Slice of `response` spanning the outermost JSON object, if any
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&response[start..=end])
}

/// Parse the outermost JSON object in `response`
pub fn extract_json(response: &str) -> Result<serde_json::Value, String> {
    let object = extract_json_object(response).ok_or_else(|| "no JSON object in response".to_string())?;
    serde_json::from_str(object).map_err(|e| format!("invalid JSON: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let value = extract_json(r#"{"confidence_score": 0.7}"#).unwrap();
        assert_eq!(value["confidence_score"], 0.7);
    }

    #[test]
    fn test_fenced_with_prose() {
        let response = "Here is the analysis:\n```json\n{\"a\": {\"b\": 1}}\n```\nLet me know.";
        let value = extract_json(response).unwrap();
        assert_eq!(value["a"]["b"], 1);
    }

    #[test]
    fn test_no_object() {
        assert!(extract_json("I cannot help with that").is_err());
        assert!(extract_json_object("} before {").is_none());
    }

    #[test]
    fn test_truncated_object_is_an_error() {
        let err = extract_json(r#"{"patterns": [ {"id": "p1"} "#).unwrap_err();
        assert!(err.contains("invalid JSON"));
    }
}
