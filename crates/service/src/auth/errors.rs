use thiserror::Error;

/// Business errors for auth workflows
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("incorrect username or password")]
    InvalidCredentials,
    #[error("account is disabled")]
    AccountDisabled,
    #[error("inactive user")]
    AccountInactive,
    #[error("username already exists")]
    UsernameTaken,
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid or expired refresh token")]
    InvalidRefreshToken,
    #[error("could not validate credentials")]
    InvalidToken,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("user not found")]
    NotFound,
    #[error("hashing error: {0}")]
    HashError(String),
    #[error("token error: {0}")]
    TokenError(String),
    #[error("repository error: {0}")]
    Repository(String),
}

impl AuthError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AuthError::Validation(_) => 1001,
            AuthError::UsernameTaken => 1002,
            AuthError::EmailTaken => 1003,
            AuthError::NotFound => 1004,
            AuthError::InvalidCredentials => 1005,
            AuthError::AccountDisabled => 1006,
            AuthError::AccountInactive => 1007,
            AuthError::InvalidRefreshToken => 1008,
            AuthError::InvalidToken => 1009,
            AuthError::HashError(_) => 1101,
            AuthError::TokenError(_) => 1102,
            AuthError::Repository(_) => 1200,
        }
    }

    /// Machine-readable code surfaced to clients.
    ///
    /// A malformed or expired access token is reported as
    /// `invalid_credentials` so callers cannot tell the failure modes apart.
    pub fn public_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials | AuthError::InvalidToken => "invalid_credentials",
            AuthError::AccountDisabled => "account_disabled",
            AuthError::AccountInactive => "account_inactive",
            AuthError::UsernameTaken => "username_exists",
            AuthError::EmailTaken => "email_exists",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::Validation(_) => "validation_error",
            AuthError::NotFound => "not_found",
            AuthError::HashError(_) | AuthError::TokenError(_) | AuthError::Repository(_) => "internal_error",
        }
    }

    /// Failures outside the business taxonomy (store, hashing, signing).
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::HashError(_) | AuthError::TokenError(_) | AuthError::Repository(_))
    }
}
