//! Typed errors for failed Graph responses.
//!
//! Every non-2xx response is classified into a [`GraphError`]. Callers branch on
//! [`GraphError::kind`] rather than on distinct error types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used when the service did not provide one.
pub const UNKNOWN_MESSAGE: &str = "Unknown SharePoint error";

/// Code used when the service did not provide one.
pub const UNKNOWN_CODE: &str = "UnknownError";

/// Error envelope returned by Graph: `{"error": {"code", "message", "innerError"}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphErrorResponse {
    #[serde(default)]
    pub error: GraphErrorBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<InnerError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InnerError {
    #[serde(rename = "request-id", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(
        rename = "client-request-id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_request_id: Option<String>,
}

impl GraphErrorResponse {
    /// Synthetic body used when a failed response carries no parseable JSON.
    pub fn synthetic(message: impl Into<String>) -> Self {
        Self {
            error: GraphErrorBody {
                code: UNKNOWN_CODE.to_string(),
                message: message.into(),
                inner_error: None,
            },
        }
    }
}

/// Discriminant plus the kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GraphErrorKind {
    /// 401 or 403.
    Auth,
    /// 404.
    NotFound,
    /// 429, with the service retry hint in seconds (0 when absent).
    Throttle {
        #[serde(rename = "retryAfter")]
        retry_after: u64,
    },
    /// 400, with per-field messages.
    Validation {
        #[serde(rename = "fieldErrors")]
        field_errors: BTreeMap<String, String>,
    },
    /// Anything else.
    Generic,
}

/// A classified Graph failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct GraphError {
    pub message: String,
    pub status: u16,
    pub code: String,
    pub request_id: String,
    #[serde(flatten)]
    pub kind: GraphErrorKind,
}

impl GraphError {
    pub fn new(
        kind: GraphErrorKind,
        message: impl Into<String>,
        status: u16,
        code: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            status,
            code: code.into(),
            request_id: request_id.into(),
            kind,
        }
    }

    pub fn not_found(message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            GraphErrorKind::NotFound,
            message,
            404,
            "ItemNotFound",
            request_id,
        )
    }

    pub fn throttle(
        message: impl Into<String>,
        retry_after: u64,
        request_id: impl Into<String>,
    ) -> Self {
        Self::new(
            GraphErrorKind::Throttle { retry_after },
            message,
            429,
            "TooManyRequests",
            request_id,
        )
    }

    pub fn validation(
        message: impl Into<String>,
        field_errors: BTreeMap<String, String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self::new(
            GraphErrorKind::Validation { field_errors },
            message,
            400,
            "ValidationError",
            request_id,
        )
    }

    /// Human-readable type name, e.g. `ThrottleError`.
    pub fn name(&self) -> &'static str {
        match self.kind {
            GraphErrorKind::Auth => "AuthError",
            GraphErrorKind::NotFound => "NotFoundError",
            GraphErrorKind::Throttle { .. } => "ThrottleError",
            GraphErrorKind::Validation { .. } => "ValidationError",
            GraphErrorKind::Generic => "GraphError",
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self.kind, GraphErrorKind::Auth)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, GraphErrorKind::NotFound)
    }

    pub fn is_throttle(&self) -> bool {
        matches!(self.kind, GraphErrorKind::Throttle { .. })
    }

    /// Retry hint in seconds for throttle errors.
    pub fn retry_after(&self) -> Option<u64> {
        match self.kind {
            GraphErrorKind::Throttle { retry_after } => Some(retry_after),
            _ => None,
        }
    }

    /// Structured representation including the type name.
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(object) = value.as_object_mut() {
            object.insert("name".to_string(), self.name().into());
        }
        value
    }
}

/// Classifies a failed response. First match wins:
/// 401/403 auth, 404 not found, 429 throttle, 400 validation, anything else generic.
pub fn parse_graph_error(
    status: u16,
    body: &GraphErrorResponse,
    retry_after_header: Option<&str>,
) -> GraphError {
    let error = &body.error;
    let request_id = error
        .inner_error
        .as_ref()
        .and_then(|inner| inner.request_id.clone())
        .unwrap_or_default();
    let message = if error.message.is_empty() {
        UNKNOWN_MESSAGE
    } else {
        error.message.as_str()
    };
    let code = if error.code.is_empty() {
        UNKNOWN_CODE
    } else {
        error.code.as_str()
    };

    match status {
        401 | 403 => GraphError::new(GraphErrorKind::Auth, message, status, code, request_id),
        404 => GraphError::not_found(message, request_id),
        429 => GraphError::throttle(
            message,
            retry_after_header.map(parse_retry_after).unwrap_or(0),
            request_id,
        ),
        400 => GraphError::validation(message, BTreeMap::new(), request_id),
        _ => GraphError::new(GraphErrorKind::Generic, message, status, code, request_id),
    }
}

/// Parses the leading integer of a `Retry-After` value; anything else is 0.
fn parse_retry_after(value: &str) -> u64 {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}
