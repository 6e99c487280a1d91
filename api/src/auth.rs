use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use axum_extra::TypedHeader;
use headers::authorization::Bearer;
use headers::Authorization;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AuthError {
    pub error: String,
    pub message: String,
}

fn unauthorized(error: &str, message: &str) -> (StatusCode, Json<AuthError>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(AuthError {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
}

/// Compares without short-circuiting on the first differing byte.
fn tokens_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    let diff = given
        .iter()
        .zip(expected)
        .fold(given.len() ^ expected.len(), |acc, (a, b)| acc | usize::from(a ^ b));
    diff == 0
}

/// Rejects requests whose `Authorization: Bearer` token differs from the configured one.
pub async fn require_bearer(
    State(expected): State<Arc<str>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<AuthError>)> {
    let Some(TypedHeader(auth)) = auth else {
        return Err(unauthorized(
            "missing_authorization",
            "Authorization Bearer token is required",
        ));
    };

    if !tokens_match(auth.token(), &expected) {
        log::warn!("Rejected request to {} with invalid token", request.uri().path());
        return Err(unauthorized("invalid_token", "Token is invalid"));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cres", "s3cret"));
        assert!(!tokens_match("s3cret-longer", "s3cret"));
        assert!(!tokens_match("s3c", "s3cret"));
        assert!(!tokens_match("", "s3cret"));
    }
}
