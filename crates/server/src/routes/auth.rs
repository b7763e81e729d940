use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::{FormRejection, JsonRejection}, FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use service::auth::{
    domain::{AuthSession, AuthUser, LoginInput, SignupInput},
    repo::{SeaOrmRefreshTokenRepository, SeaOrmUserRepository},
    AuthError, AuthService,
};

use crate::errors::JsonApiError;

pub type SeaOrmAuthService = AuthService<SeaOrmUserRepository, SeaOrmRefreshTokenRepository>;

#[derive(Clone)]
pub struct ServerState {
    pub auth: Arc<SeaOrmAuthService>,
}

/// OAuth2 password-grant form; `username` may also be an email address.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenOut {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl From<AuthSession> for TokenOut {
    fn from(s: AuthSession) -> Self {
        Self {
            access_token: s.access_token,
            token_type: s.token_type.to_string(),
            refresh_token: s.refresh_token,
            expires_in: s.expires_in,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserOut {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub disabled: bool,
}

impl From<AuthUser> for UserOut {
    fn from(u: AuthUser) -> Self {
        Self { username: u.username, email: u.email, full_name: u.full_name, disabled: !u.is_active }
    }
}

/// `Authorization: Bearer <jwt>`; anything else is rejected like a bad token.
pub struct BearerToken(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = JsonApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts.headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
        match raw.and_then(|h| h.strip_prefix("Bearer ")).map(str::trim) {
            Some(token) if !token.is_empty() => Ok(BearerToken(token.to_string())),
            _ => {
                warn!(path = %parts.uri.path(), "missing or malformed bearer token");
                Err(AuthError::InvalidToken.into())
            }
        }
    }
}

#[utoipa::path(post, path = "/auth/token", tag = "auth",
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 200, body = TokenOut), (status = 401, description = "Invalid credentials"), (status = 403, description = "Account disabled")))]
pub async fn token(
    State(state): State<ServerState>,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Result<Json<TokenOut>, JsonApiError> {
    let Form(form) = form.map_err(|e| JsonApiError::validation(e.body_text()))?;
    let session = state.auth.login(LoginInput { identifier: form.username, password: form.password }).await?;
    Ok(Json(session.into()))
}

#[utoipa::path(post, path = "/auth/refresh", tag = "auth", request_body = RefreshRequest,
    responses((status = 200, body = TokenOut), (status = 400, description = "Missing refresh token"), (status = 401, description = "Invalid refresh token")))]
pub async fn refresh(
    State(state): State<ServerState>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Json<TokenOut>, JsonApiError> {
    let token = payload
        .and_then(|Json(p)| p.refresh_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(JsonApiError::missing_refresh_token)?;
    let session = state.auth.refresh(&token).await?;
    Ok(Json(session.into()))
}

#[utoipa::path(post, path = "/auth/logout", tag = "auth", request_body = RefreshRequest,
    responses((status = 204, description = "Logged out")))]
pub async fn logout(
    State(state): State<ServerState>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<StatusCode, JsonApiError> {
    if let Some(token) = payload.and_then(|Json(p)| p.refresh_token).filter(|t| !t.is_empty()) {
        state.auth.logout(&token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(post, path = "/auth/signup", tag = "auth", request_body = SignupRequest,
    responses((status = 201, body = UserOut), (status = 400, description = "Username or email taken"), (status = 422, description = "Validation error")))]
pub async fn signup(
    State(state): State<ServerState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserOut>), JsonApiError> {
    let Json(req) = payload.map_err(|e| JsonApiError::validation(e.body_text()))?;
    let user = state
        .auth
        .signup(SignupInput { username: req.username, email: req.email, password: req.password, full_name: req.full_name })
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(get, path = "/auth/users/me", tag = "auth",
    responses((status = 200, body = UserOut), (status = 400, description = "Inactive user"), (status = 401, description = "Invalid credentials")))]
pub async fn me(State(state): State<ServerState>, BearerToken(token): BearerToken) -> Result<Json<UserOut>, JsonApiError> {
    let user = state.auth.current_user(&token).await?;
    state.auth.require_active(&user)?;
    Ok(Json(user.into()))
}
