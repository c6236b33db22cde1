//! Normalized errors returned by every failing API call

use serde_json::Value;

use super::http::HttpResponse;

/// Message used when the backend gives no usable message
pub const GENERIC_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Broad classification of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The request never produced a response (DNS, connect, timeout)
    Network,
    /// 401 that could not be recovered by a refresh
    Unauthorized,
    /// 403; the session has been logged out
    SessionTerminated,
    /// Any other non-2xx response
    Http,
    /// A 2xx body that does not match the expected type
    Decode,
    /// The request body or query parameters could not be serialized
    Encode,
}

/// Uniform error shape for every failure path of the client
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    /// HTTP status, or the backend's `statusCode` when it sent one. `0` when
    /// no response was received.
    pub status: u16,
    /// Backend error code (`error.code`)
    pub code: Option<String>,
    /// Backend error details (`error.details`)
    pub details: Option<Value>,
    /// The backend's JSON error body, when it was valid JSON
    pub body: Option<Value>,
}

impl ApiError {
    fn new(kind: ApiErrorKind, message: impl Into<String>, status: u16) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
            code: None,
            details: None,
            body: None,
        }
    }

    /// Transport-level failure
    pub fn network(err: &anyhow::Error) -> Self {
        Self::new(ApiErrorKind::Network, format!("{err:#}"), 0)
    }

    /// The session could not be refreshed after a 401
    pub fn session_expired() -> Self {
        Self::new(ApiErrorKind::Unauthorized, "Session expired", 401)
    }

    /// Serialization of an outgoing body or query failed
    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Encode, message, 0)
    }

    /// A successful response whose body did not decode
    pub fn decode(status: u16, err: &serde_json::Error) -> Self {
        Self::new(
            ApiErrorKind::Decode,
            format!("Failed to parse response: {err}"),
            status,
        )
    }

    /// Normalizes a non-2xx response
    ///
    /// The backend body is read leniently: `message` (string or list of
    /// strings), `statusCode`, `error.code` and `error.details` are all
    /// optional. A body that is not a JSON object yields the generic message
    /// and the raw HTTP status.
    pub fn from_response(response: &HttpResponse) -> Self {
        let kind = match response.status {
            401 => ApiErrorKind::Unauthorized,
            403 => ApiErrorKind::SessionTerminated,
            _ => ApiErrorKind::Http,
        };

        let Ok(body @ Value::Object(_)) = serde_json::from_str::<Value>(&response.body) else {
            return Self::new(kind, GENERIC_ERROR_MESSAGE, response.status);
        };

        let message = body
            .get("message")
            .and_then(message_text)
            .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());

        let status = body
            .get("statusCode")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(response.status);

        let error = body.get("error");
        let code = error.and_then(|e| e.get("code")).and_then(|c| match c {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        let details = error
            .and_then(|e| e.get("details"))
            .filter(|d| !d.is_null())
            .cloned();

        Self {
            kind,
            message,
            status,
            code,
            details,
            body: Some(body),
        }
    }

    /// Returns true when a 401 could not be recovered
    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }

    /// Returns true when the call ended the session (403)
    pub fn is_session_terminated(&self) -> bool {
        self.kind == ApiErrorKind::SessionTerminated
    }

    /// Returns true when no response was received
    pub fn is_network(&self) -> bool {
        self.kind == ApiErrorKind::Network
    }
}

// Validation errors arrive as a list of messages
fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn backend_message_and_status_are_used() {
        let err = ApiError::from_response(&response(
            400,
            r#"{"message": "Invalid data", "statusCode": 400}"#,
        ));

        assert_eq!(err.kind, ApiErrorKind::Http);
        assert_eq!(err.message, "Invalid data");
        assert_eq!(err.status, 400);
        assert_eq!(err.to_string(), "Invalid data");
    }

    #[test]
    fn unparsable_body_uses_generic_message_and_raw_status() {
        let err = ApiError::from_response(&response(502, "<html>Bad Gateway</html>"));

        assert_eq!(err.message, GENERIC_ERROR_MESSAGE);
        assert_eq!(err.status, 502);
        assert!(err.body.is_none());
    }

    #[test]
    fn non_object_json_is_treated_as_unparsable() {
        let err = ApiError::from_response(&response(500, r#""boom""#));

        assert_eq!(err.message, GENERIC_ERROR_MESSAGE);
        assert_eq!(err.status, 500);
    }

    #[test]
    fn missing_fields_fall_back() {
        let err = ApiError::from_response(&response(422, "{}"));

        assert_eq!(err.message, GENERIC_ERROR_MESSAGE);
        assert_eq!(err.status, 422);
        assert!(err.code.is_none());
        assert!(err.details.is_none());
        assert_eq!(err.body, Some(json!({})));
    }

    #[test]
    fn error_code_and_details_are_extracted() {
        let err = ApiError::from_response(&response(
            409,
            r#"{
                "message": "Exam already published",
                "statusCode": 409,
                "error": {"code": "EXAM_PUBLISHED", "details": {"examId": "e-12"}}
            }"#,
        ));

        assert_eq!(err.code.as_deref(), Some("EXAM_PUBLISHED"));
        assert_eq!(err.details, Some(json!({"examId": "e-12"})));
    }

    #[test]
    fn numeric_error_code_is_stringified() {
        let err = ApiError::from_response(&response(400, r#"{"error": {"code": 1042}}"#));

        assert_eq!(err.code.as_deref(), Some("1042"));
    }

    #[test]
    fn validation_message_list_is_joined() {
        let err = ApiError::from_response(&response(
            400,
            r#"{"message": ["email must be an email", "password is too short"]}"#,
        ));

        assert_eq!(err.message, "email must be an email; password is too short");
    }

    #[test]
    fn out_of_range_status_code_is_ignored() {
        let err = ApiError::from_response(&response(400, r#"{"statusCode": 70000}"#));

        assert_eq!(err.status, 400);
    }

    #[test]
    fn kind_follows_http_status() {
        assert!(ApiError::from_response(&response(401, "")).is_unauthorized());
        assert!(ApiError::from_response(&response(403, "")).is_session_terminated());
        assert_eq!(
            ApiError::from_response(&response(404, "")).kind,
            ApiErrorKind::Http
        );
    }

    #[test]
    fn network_error_has_no_status() {
        let err = ApiError::network(&anyhow::anyhow!("connection refused"));

        assert!(err.is_network());
        assert_eq!(err.status, 0);
        assert!(err.message.contains("connection refused"));
    }

    #[test]
    fn session_expired_is_401() {
        let err = ApiError::session_expired();

        assert!(err.is_unauthorized());
        assert_eq!(err.status, 401);
    }
}
