//! Error types for labmatch-gateway

use labmatch_common::backend::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response. `message` is the server's error message when the body
    /// carries one, otherwise the raw body.
    #[error("status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid url: {0}")]
    Url(String),

    #[error("missing configuration: {0}")]
    Config(&'static str),

    #[error("{0} not found")]
    NotFound(String),

    #[error("realtime: {0}")]
    Realtime(String),
}

impl From<GatewayError> for BackendError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Status { status: 401 | 403, .. } => BackendError::Unauthorized,
            GatewayError::Status { status: 404, message } => BackendError::NotFound(message),
            GatewayError::Status { status, message } => BackendError::Rejected { status, message },
            GatewayError::Http(e) if e.is_decode() => BackendError::Decode(e.to_string()),
            GatewayError::Http(e) => BackendError::Network(e.to_string()),
            GatewayError::Json(e) => BackendError::Decode(e.to_string()),
            GatewayError::WebSocket(e) => BackendError::Realtime(e.to_string()),
            GatewayError::Realtime(msg) => BackendError::Realtime(msg),
            GatewayError::NotFound(what) => BackendError::NotFound(what),
            e @ (GatewayError::Url(_) | GatewayError::Config(_)) => BackendError::Other(e.to_string()),
        }
    }
}

/// Pull the human-readable message out of an error body.
///
/// PostgREST and the storage API both answer with `{"message": ...}`; anything
/// else is passed through as text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_unauthorized() {
        for status in [401, 403] {
            let e = GatewayError::Status {
                status,
                message: "JWT expired".into(),
            };
            assert_eq!(BackendError::from(e), BackendError::Unauthorized);
        }
    }

    #[test]
    fn other_statuses_keep_the_message() {
        let e = GatewayError::Status {
            status: 409,
            message: "duplicate key value".into(),
        };
        assert_eq!(
            BackendError::from(e),
            BackendError::Rejected {
                status: 409,
                message: "duplicate key value".into()
            }
        );
    }

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key value"}"#),
            "duplicate key value"
        );
        assert_eq!(error_message(r#"{"error":"Bucket not found"}"#), "Bucket not found");
        assert_eq!(error_message(" upstream timeout \n"), "upstream timeout");
    }
}
