//! Shared HTTP utilities for the KYC registry workspace.
//!
//! Provides the JSON error envelope and the mapping from contract errors to
//! HTTP status codes used by host processes.

use domain::CoreError;

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Resource not found",
        "bad_request" => "Bad request",
        "conflict" => "Resource already set",
        "corrupt_record" => "Stored record is malformed",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

// ============================================================================
// Error Classification
// ============================================================================

/// HTTP status and error code for a contract error.
pub fn classify(err: &CoreError) -> (u16, &'static str) {
    match err {
        CoreError::NotFound(_) => (404, "not_found"),
        CoreError::AlreadySet(_) => (409, "conflict"),
        CoreError::CorruptRecord { .. } => (422, "corrupt_record"),
        CoreError::StorageRead(_) | CoreError::StorageWrite(_) => (500, "internal"),
    }
}

/// Error envelope for a contract error. Storage failures keep the default
/// message so backend details stay in the logs.
pub fn core_error_body(err: &CoreError) -> serde_json::Value {
    match classify(err) {
        (500, code) => json_err(code),
        (_, code) => json_error_with_message(code, &err.to_string()),
    }
}
