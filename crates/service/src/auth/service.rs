use std::sync::Arc;

use jsonwebtoken::Algorithm;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::domain::{AuthSession, AuthUser, LoginInput, NewUserRecord, SignupInput};
use super::errors::AuthError;
use super::password;
use super::refresh::RefreshTokenStore;
use super::repository::{RefreshTokenRepository, UserRepository};
use super::token::{parse_algorithm, TokenIssuer};

/// Auth service configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub algorithm: Algorithm,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
}

impl AuthConfig {
    /// Defaults (HS256, 30 minutes, 30 days) around a fixed secret.
    pub fn with_secret(secret: &str) -> Self {
        Self {
            jwt_secret: Some(secret.to_string()),
            algorithm: Algorithm::HS256,
            access_ttl: chrono::Duration::minutes(30),
            refresh_ttl: chrono::Duration::days(30),
        }
    }

    pub fn from_settings(settings: &configs::AuthConfig) -> Result<Self, AuthError> {
        let out_of_range = |field: &str| AuthError::TokenError(format!("{field} out of range"));
        Ok(Self {
            jwt_secret: settings.secret_key.clone(),
            algorithm: parse_algorithm(&settings.algorithm)?,
            access_ttl: chrono::Duration::try_minutes(settings.access_token_expire_minutes)
                .ok_or_else(|| out_of_range("access_token_expire_minutes"))?,
            refresh_ttl: chrono::Duration::try_days(settings.refresh_token_expire_days)
                .ok_or_else(|| out_of_range("refresh_token_expire_days"))?,
        })
    }
}

/// Auth business service independent of web framework
pub struct AuthService<U: UserRepository, T: RefreshTokenRepository> {
    users: Arc<U>,
    refresh: RefreshTokenStore<T>,
    issuer: TokenIssuer,
    access_ttl: chrono::Duration,
}

impl<U: UserRepository, T: RefreshTokenRepository> AuthService<U, T> {
    /// Fails with `TokenError` when no signing secret is configured.
    pub fn new(users: Arc<U>, tokens: Arc<T>, cfg: AuthConfig) -> Result<Self, AuthError> {
        let secret = cfg.jwt_secret.as_deref();
        let issuer = TokenIssuer::new(secret, cfg.algorithm)?;
        let refresh = RefreshTokenStore::new(tokens, secret.unwrap_or_default(), cfg.refresh_ttl)?;
        Ok(Self { users, refresh, issuer, access_ttl: cfg.access_ttl })
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Register a new active user with a hashed password.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{service::{AuthService, AuthConfig}, repository::mock::{MockUserRepository, MockRefreshTokenRepository}};
    /// use service::auth::domain::SignupInput;
    /// use std::sync::Arc;
    /// let svc = AuthService::new(
    ///     Arc::new(MockUserRepository::default()),
    ///     Arc::new(MockRefreshTokenRepository::default()),
    ///     AuthConfig::with_secret("secret"),
    /// ).unwrap();
    /// let input = SignupInput { username: "alice".into(), email: "alice@x.com".into(), password: "pw1".into(), full_name: None };
    /// let user = tokio_test::block_on(svc.signup(input)).unwrap();
    /// assert_eq!(user.username, "alice");
    /// assert!(user.is_active);
    /// ```
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn signup(&self, input: SignupInput) -> Result<AuthUser, AuthError> {
        if input.username.trim().is_empty() {
            return Err(AuthError::Validation("username required".into()));
        }
        if !input.email.contains('@') {
            return Err(AuthError::Validation("invalid email".into()));
        }
        if input.password.trim().is_empty() {
            return Err(AuthError::Validation("password required".into()));
        }
        if self.users.find_by_username(&input.username).await?.is_some() {
            debug!("username taken");
            return Err(AuthError::UsernameTaken);
        }
        if self.users.find_by_email(&input.email).await?.is_some() {
            debug!("email taken");
            return Err(AuthError::EmailTaken);
        }

        let password_hash = password::hash(&input.password)?;
        let user = self
            .users
            .create_user(NewUserRecord {
                username: input.username,
                email: input.email,
                password_hash,
                full_name: input.full_name,
            })
            .await?;
        info!(user_id = %user.id, username = %user.username, "user_registered");
        Ok(user)
    }

    /// Authenticate by username or email and open a session.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{service::{AuthService, AuthConfig}, repository::mock::{MockUserRepository, MockRefreshTokenRepository}};
    /// use service::auth::domain::{SignupInput, LoginInput};
    /// use std::sync::Arc;
    /// let svc = AuthService::new(
    ///     Arc::new(MockUserRepository::default()),
    ///     Arc::new(MockRefreshTokenRepository::default()),
    ///     AuthConfig::with_secret("secret"),
    /// ).unwrap();
    /// let _ = tokio_test::block_on(svc.signup(SignupInput { username: "u".into(), email: "u@e.com".into(), password: "Passw0rd".into(), full_name: None }));
    /// let session = tokio_test::block_on(svc.login(LoginInput { identifier: "u@e.com".into(), password: "Passw0rd".into() })).unwrap();
    /// assert_eq!(session.user.username, "u");
    /// assert_eq!(session.token_type, "bearer");
    /// ```
    #[instrument(skip(self, input))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError> {
        let Some((user, creds)) = self.users.find_by_identifier(&input.identifier).await? else {
            password::verify_dummy(&input.password);
            warn!(reason = "unknown_identifier", "login_rejected");
            return Err(AuthError::InvalidCredentials);
        };
        if !password::verify(&input.password, &creds.password_hash) {
            warn!(user_id = %user.id, reason = "bad_password", "login_rejected");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            warn!(user_id = %user.id, reason = "disabled", "login_rejected");
            return Err(AuthError::AccountDisabled);
        }

        let access_token = self.issuer.issue_access_token(&user.username, self.access_ttl)?;
        let refresh = self.refresh.issue(user.id).await?;
        info!(user_id = %user.id, "login_succeeded");
        Ok(self.session(user, access_token, refresh.token))
    }

    /// Exchange a refresh token for a new pair; the presented token is spent.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let Some(record) = self.refresh.validate(refresh_token).await? else {
            warn!(reason = "invalid", "refresh_rejected");
            return Err(AuthError::InvalidRefreshToken);
        };
        let Some(user) = self.users.find_by_id(record.user_id).await? else {
            warn!(user_id = %record.user_id, reason = "owner_missing", "refresh_rejected");
            return Err(AuthError::AccountDisabled);
        };
        if !user.is_active {
            warn!(user_id = %user.id, reason = "disabled", "refresh_rejected");
            return Err(AuthError::AccountDisabled);
        }

        let access_token = self.issuer.issue_access_token(&user.username, self.access_ttl)?;
        let Some(next) = self.refresh.rotate_from(&record).await? else {
            warn!(user_id = %user.id, reason = "already_rotated", "refresh_rejected");
            return Err(AuthError::InvalidRefreshToken);
        };
        info!(user_id = %user.id, "refresh_rotated");
        Ok(self.session(user, access_token, next.token))
    }

    /// Revoke a refresh token. Unknown or already revoked tokens are fine.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.refresh.revoke(refresh_token).await?;
        info!("logout");
        Ok(())
    }

    /// Resolve the user behind a bearer access token. A bad token and an
    /// unknown subject both fail with `InvalidToken`.
    #[instrument(skip_all)]
    pub async fn current_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let username = self.issuer.verify_access_token(access_token)?;
        self.users.find_by_username(&username).await?.ok_or(AuthError::InvalidToken)
    }

    pub fn require_active(&self, user: &AuthUser) -> Result<(), AuthError> {
        if user.is_active { Ok(()) } else { Err(AuthError::AccountInactive) }
    }

    #[instrument(skip(self))]
    pub async fn set_active(&self, user_id: Uuid, active: bool) -> Result<AuthUser, AuthError> {
        let user = self.users.set_active(user_id, active).await?.ok_or(AuthError::NotFound)?;
        info!(user_id = %user.id, active, "user_activation_changed");
        Ok(user)
    }

    fn session(&self, user: AuthUser, access_token: String, refresh_token: String) -> AuthSession {
        AuthSession {
            user,
            access_token,
            token_type: "bearer",
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
        }
    }
}
