//! # Parsing Utils
//!
//! Utilities for pulling structured replies out of raw advisor text.
//! Advisor output is untrusted: anything that does not parse is treated as absent.

use serde::de::DeserializeOwned;

/// The span from the first `{` to the last `}`, which tolerates prose or code
/// fences around a JSON object.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Extracts and deserializes the JSON object in `response`.
pub fn parse_reply<T: DeserializeOwned>(response: &str) -> Option<T> {
    let Some(json) = extract_json_object(response) else {
        tracing::debug!("No JSON object in advisor reply");
        return None;
    };
    match serde_json::from_str(json) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Unparseable advisor reply: {}", e);
            None
        }
    }
}
