// ===============================
// src/error.rs
// ===============================
//
// Error taxonomy:
// - ConfigError : fatal at startup, never reaches request handling.
// - ApiError    : per-request failure, rendered as an ErrorEnvelope at the
//                 HTTP boundary (see `translate`).
//
use hyper::StatusCode;
use serde::Serialize;
use serde_json::value::{to_raw_value, RawValue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid upstream base url {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },
    #[error("invalid order route {0:?}: must start with '/'")]
    OrderRoute(String),
    #[error("invalid listen address {0:?}")]
    ListenAddr(String),
    #[error("HMAC key rejected")]
    Hmac,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller input rejected before any signing or network call.
    #[error("{0}")]
    Validation(String),
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    /// Upstream answered with a non-2xx status; `body` is kept byte-for-byte.
    #[error("upstream returned HTTP {status}")]
    Upstream { status: u16, body: String },
    #[error("upstream request failed: {0}")]
    Network(String),
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::BodyTooLarge { .. } => "too_large",
            ApiError::Upstream { .. } => "upstream",
            ApiError::Network(_) => "network",
            ApiError::Malformed(_) => "malformed",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, ApiError::Validation(_) | ApiError::BodyTooLarge { .. })
    }

    /// Upstream body verbatim when there is one, otherwise the local message.
    pub fn details(&self) -> Box<RawValue> {
        match self {
            ApiError::Upstream { body, .. } => upstream_details(body),
            other => text_details(&other.to_string()),
        }
    }
}

/// JSON string literal holding `msg`.
pub fn text_details(msg: &str) -> Box<RawValue> {
    to_raw_value(msg).unwrap_or_else(|_| RawValue::NULL.to_owned())
}

/// Interpret an upstream error body: valid JSON is embedded as the exact bytes
/// received, anything else (HTML error pages, plain text, empty) as a string.
pub fn upstream_details(body: &str) -> Box<RawValue> {
    RawValue::from_string(body.to_string()).unwrap_or_else(|_| text_details(body))
}

/// Caller-facing operations, used to pick the envelope category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Balance,
    Price,
    Order,
}

impl Operation {
    pub fn failure_category(&self) -> &'static str {
        match self {
            Operation::Balance => "Failed to fetch BTC balance",
            Operation::Price => "Failed to fetch price",
            Operation::Order => "Trade failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub details: Box<RawValue>,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>, details: Box<RawValue>) -> Self {
        Self { error: error.into(), details }
    }

    pub fn text(error: impl Into<String>, message: &str) -> Self {
        Self::new(error, text_details(message))
    }

    pub fn to_body(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"error":"internal error","details":null}"#.to_string())
    }
}

/// Single terminal transition: any failure -> (status, envelope).
pub fn translate(op: Operation, err: &ApiError) -> (StatusCode, ErrorEnvelope) {
    let category = if err.is_client_error() {
        "Invalid order request"
    } else {
        op.failure_category()
    };
    (err.status(), ErrorEnvelope::new(category, err.details()))
}
