//! API response envelope.
//!
//! Every API reply is wrapped as
//! `{api_status_code, api_server_version, api_response, api_error_message}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wrapped API reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub api_status_code: u16,
    pub api_server_version: String,
    pub api_response: T,
    pub api_error_message: String,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.api_status_code >= 200 && self.api_status_code < 300
    }
}

const ENVELOPE_FIELDS: [&str; 4] = [
    "api_status_code",
    "api_server_version",
    "api_response",
    "api_error_message",
];

/// Whether `value` is an object carrying all four envelope fields.
#[must_use]
pub fn is_api_data(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| ENVELOPE_FIELDS.iter().all(|field| map.contains_key(*field)))
}

/// Parse an envelope, returning `None` for anything that is not one.
#[must_use]
pub fn parse_api_data(value: &Value) -> Option<ApiResponse> {
    if !is_api_data(value) {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Outcome merged from the data, error and failure-reason replies of one
/// request. Each field takes the first non-empty value in that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiOutcome {
    pub status_code: Option<u16>,
    pub server_version: Option<String>,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ApiOutcome {
    #[must_use]
    pub fn resolve(
        data: Option<&ApiResponse>,
        error: Option<&ApiResponse>,
        failure_reason: Option<&ApiResponse>,
    ) -> Self {
        let replies = [data, error, failure_reason];
        let replies = replies.iter().flatten();
        Self {
            status_code: replies
                .clone()
                .map(|r| r.api_status_code)
                .find(|code| *code != 0),
            server_version: replies
                .clone()
                .map(|r| &r.api_server_version)
                .find(|v| !v.is_empty())
                .cloned(),
            data: replies
                .clone()
                .map(|r| &r.api_response)
                .find(|v| is_truthy(v))
                .cloned(),
            error: replies
                .map(|r| &r.api_error_message)
                .find(|v| !v.is_empty())
                .cloned(),
        }
    }
}

/// `null`, `false`, `0` and `""` carry no data.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(code: u16, version: &str, response: Value, error: &str) -> ApiResponse {
        ApiResponse {
            api_status_code: code,
            api_server_version: version.to_string(),
            api_response: response,
            api_error_message: error.to_string(),
        }
    }

    #[test]
    fn detects_envelopes() {
        let ok = json!({
            "api_status_code": 200,
            "api_server_version": "4.5.0",
            "api_response": {"items": []},
            "api_error_message": ""
        });
        assert!(is_api_data(&ok));
        assert_eq!(parse_api_data(&ok).unwrap().api_status_code, 200);

        let partial = json!({"api_status_code": 200, "api_response": {}});
        assert!(!is_api_data(&partial));
        assert!(!is_api_data(&json!(null)));
        assert!(!is_api_data(&json!([1, 2])));
        assert!(parse_api_data(&partial).is_none());
    }

    #[test]
    fn resolve_prefers_first_non_empty_value() {
        let data = reply(0, "", Value::Null, "");
        let error = reply(404, "4.5.0", json!(""), "not found");
        let failure = reply(500, "4.4.0", json!({"detail": "x"}), "boom");

        let outcome = ApiOutcome::resolve(Some(&data), Some(&error), Some(&failure));
        assert_eq!(outcome.status_code, Some(404));
        assert_eq!(outcome.server_version.as_deref(), Some("4.5.0"));
        assert_eq!(outcome.data, Some(json!({"detail": "x"})));
        assert_eq!(outcome.error.as_deref(), Some("not found"));
    }

    #[test]
    fn resolve_of_nothing_is_empty() {
        assert_eq!(ApiOutcome::resolve(None, None, None), ApiOutcome::default());
        let falsy = reply(0, "", json!(0), "");
        assert_eq!(ApiOutcome::resolve(Some(&falsy), None, None), ApiOutcome::default());
    }

    #[test]
    fn success_range() {
        assert!(reply(204, "", Value::Null, "").is_success());
        assert!(!reply(401, "", Value::Null, "").is_success());
    }
}
