use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use service::auth::AuthError;
use thiserror::Error;
use tracing::error;

/// JSON error body `{"code": ..., "message": ...}` returned by every handler.
#[derive(Debug)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl JsonApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    pub fn missing_refresh_token() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "missing_refresh_token", "Missing refresh token")
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message)
    }
}

fn status_for(e: &AuthError) -> StatusCode {
    match e {
        AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
        AuthError::AccountDisabled => StatusCode::FORBIDDEN,
        AuthError::AccountInactive | AuthError::UsernameTaken | AuthError::EmailTaken => StatusCode::BAD_REQUEST,
        AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::NotFound => StatusCode::NOT_FOUND,
        AuthError::HashError(_) | AuthError::TokenError(_) | AuthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AuthError> for JsonApiError {
    fn from(e: AuthError) -> Self {
        if e.is_internal() {
            // detail stays in the log
            error!(code = e.code(), error = %e, "internal error");
            return Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.public_code(), "Internal server error");
        }
        Self::new(status_for(&e), e.public_code(), e.to_string())
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({"code": self.code, "message": self.message}));
        let mut resp = (self.status, body).into_response();
        if self.code == "invalid_credentials" {
            resp.headers_mut().insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        resp
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("database unavailable: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_business_errors_to_status() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED, "invalid_credentials"),
            (AuthError::InvalidToken, StatusCode::UNAUTHORIZED, "invalid_credentials"),
            (AuthError::AccountDisabled, StatusCode::FORBIDDEN, "account_disabled"),
            (AuthError::AccountInactive, StatusCode::BAD_REQUEST, "account_inactive"),
            (AuthError::UsernameTaken, StatusCode::BAD_REQUEST, "username_exists"),
            (AuthError::EmailTaken, StatusCode::BAD_REQUEST, "email_exists"),
            (AuthError::InvalidRefreshToken, StatusCode::UNAUTHORIZED, "invalid_refresh_token"),
            (AuthError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            (AuthError::NotFound, StatusCode::NOT_FOUND, "not_found"),
        ];
        for (err, status, code) in cases {
            let api = JsonApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.code, code);
        }
    }

    #[test]
    fn internal_detail_is_hidden() {
        let api = JsonApiError::from(AuthError::Repository("connection refused".into()));
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, "Internal server error");
    }

    #[test]
    fn invalid_credentials_carry_www_authenticate() {
        let resp = JsonApiError::from(AuthError::InvalidCredentials).into_response();
        assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
        let resp = JsonApiError::from(AuthError::InvalidRefreshToken).into_response();
        assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn bad_bearer_token_has_its_own_message() {
        let api = JsonApiError::from(AuthError::InvalidToken);
        assert_eq!(api.code, "invalid_credentials");
        assert_eq!(api.message, "could not validate credentials");
        let resp = api.into_response();
        assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    }
}
