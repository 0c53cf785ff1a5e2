//! Access-token gate in front of routed requests.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::cookie::{CookieJar, extract_access_token};
use super::errors::{EdgeFailure, ErrorKind};
use crate::jwt::{TokenCodec, TokenType};

/// Header carrying the authenticated caller to downstream services.
pub const MEMBER_ID_HEADER: &str = "member-id";

/// Result of authenticating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated { member_id: i64 },
    Rejected(ErrorKind),
}

/// Authenticate a request from its access-token cookie.
///
/// A missing cookie is verified as an empty token, so it is rejected exactly
/// like a malformed one.
pub fn authenticate(codec: &TokenCodec, headers: &HeaderMap) -> AuthOutcome {
    let jar = CookieJar::from_headers(headers);
    let token = extract_access_token(&jar).unwrap_or_default();

    match codec.verify(token, TokenType::Access) {
        Ok(claims) => AuthOutcome::Authenticated {
            member_id: claims.member_id,
        },
        Err(kind) => AuthOutcome::Rejected(kind),
    }
}

/// Middleware: forward authenticated requests with `member-id` set, reject
/// everything else with the JSON error envelope.
pub async fn require_access_token(
    State(codec): State<Arc<TokenCodec>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&codec, request.headers()) {
        AuthOutcome::Authenticated { member_id } => {
            // Overwrites any client-supplied value.
            request.headers_mut().insert(
                HeaderName::from_static(MEMBER_ID_HEADER),
                HeaderValue::from(member_id),
            );
            next.run(request).await
        }
        AuthOutcome::Rejected(kind) => {
            tracing::debug!(
                path = %request.uri().path(),
                error = kind.code(),
                "Request rejected"
            );
            EdgeFailure::Rejected(kind).into_response()
        }
    }
}
