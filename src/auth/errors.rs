//! Authentication error types and the JSON error envelope.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Authentication failure exposed to callers.
///
/// Every structural or signature problem is reported as
/// [`ErrorKind::TokenAuthorizationFail`]; only a correctly signed but stale
/// token is reported as [`ErrorKind::TokenExpired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TokenAuthorizationFail,
    TokenExpired,
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::TokenAuthorizationFail | ErrorKind::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::TokenAuthorizationFail => "Token authentication failed",
            ErrorKind::TokenExpired => "Token has expired",
        }
    }

    /// Stable identifier used in logs.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::TokenAuthorizationFail => "TOKEN_AUTHORIZATION_FAIL",
            ErrorKind::TokenExpired => "TOKEN_EXPIRED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ErrorKind {}

/// Anything that stops a request at the gateway edge.
#[derive(Debug)]
pub enum EdgeFailure {
    /// Authentication rejected the request
    Rejected(ErrorKind),
    /// Any other failure; the detail is logged, never sent
    Unhandled(String),
}

impl From<ErrorKind> for EdgeFailure {
    fn from(kind: ErrorKind) -> Self {
        EdgeFailure::Rejected(kind)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    message: &'static str,
}

impl IntoResponse for EdgeFailure {
    fn into_response(self) -> Response {
        let kind = match self {
            EdgeFailure::Rejected(kind) => kind,
            EdgeFailure::Unhandled(detail) => {
                tracing::error!(error = %detail, "Unhandled failure at gateway edge");
                ErrorKind::TokenAuthorizationFail
            }
        };

        let status = kind.status_code();
        json_response(
            status,
            &ErrorBody {
                status: status.as_u16(),
                message: kind.message(),
            },
        )
    }
}

/// Serialize `body` as a JSON response, degrading to a plain-text 500 when
/// serialization fails.
pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize error response");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
