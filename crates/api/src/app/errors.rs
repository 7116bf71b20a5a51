//! Stable error codes and HTTP responses.
//!
//! Business outcomes travel as numeric codes with fixed messages. The
//! translation is total: an unrecognized code degrades to the generic
//! technical code and message instead of failing.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tally_core::LedgerError;

/// Stable numeric outcome codes (external contract).
pub const OK: i32 = 0;
pub const ACCOUNT_DOESNT_EXIST: i32 = 1;
pub const INSUFFICIENT_FUNDS: i32 = 2;
pub const TECHNICAL_ERROR: i32 = 3;

pub const ACCOUNT_DOESNT_EXIST_MESSAGE: &str = "Requested account doesn't exist";
pub const INSUFFICIENT_FUNDS_MESSAGE: &str = "Insufficient funds on the account to charge";
pub const TECHNICAL_ERROR_MESSAGE: &str = "Technical error";

/// Numeric code for a business outcome.
pub fn error_code(err: &LedgerError) -> i32 {
    match err {
        LedgerError::AccountNotFound => ACCOUNT_DOESNT_EXIST,
        LedgerError::InsufficientFunds => INSUFFICIENT_FUNDS,
        LedgerError::Technical(_) => TECHNICAL_ERROR,
    }
}

/// Message for a numeric code. Unknown codes get the generic technical
/// message.
pub fn translate_error_code(code: i32) -> &'static str {
    match code {
        ACCOUNT_DOESNT_EXIST => ACCOUNT_DOESNT_EXIST_MESSAGE,
        INSUFFICIENT_FUNDS => INSUFFICIENT_FUNDS_MESSAGE,
        _ => TECHNICAL_ERROR_MESSAGE,
    }
}

/// HTTP status for a numeric code. Business outcomes are client errors;
/// everything else, including unknown codes, is a server error.
pub fn status_for_error_code(code: i32) -> StatusCode {
    match code {
        ACCOUNT_DOESNT_EXIST | INSUFFICIENT_FUNDS => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a ledger failure as its stable external response.
///
/// Technical detail stays in the logs; the response body carries only the
/// generic message.
pub fn ledger_error_to_response(err: &LedgerError) -> Response {
    if let Some(detail) = err.detail() {
        tracing::error!(detail, "ledger operation failed");
    }
    let code = error_code(err);
    json_error(status_for_error_code(code), code, translate_error_code(code))
}

pub fn validation_error(message: &'static str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({ "message": message })),
    )
        .into_response()
}

pub fn json_error(status: StatusCode, code: i32, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error_code": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
