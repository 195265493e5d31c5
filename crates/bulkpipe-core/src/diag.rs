//! JSON rendering of values for log and error payloads.

use serde::Serialize;

/// Serialize `value` as compact JSON. Never fails: serialization errors are
/// rendered inline so a log line is never lost.
pub fn stringify<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RowError, RowErrors};

    #[test]
    fn row_errors_render_as_json_object() {
        let mut errors = RowErrors::new();
        errors.insert(2, vec![RowError::new(2, "invalid", "bad field")]);
        assert_eq!(
            stringify(&errors),
            r#"{"2":[{"index":2,"reason":"invalid","message":"bad field"}]}"#
        );
    }
}
