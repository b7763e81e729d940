use chrono::Utc;
use models::errors::ModelError;
use sea_orm::{DatabaseConnection, TransactionTrait};
use uuid::Uuid;

use crate::auth::domain::{AuthUser, Credentials, NewRefreshToken, NewUserRecord, RefreshTokenRecord};
use crate::auth::errors::AuthError;
use crate::auth::repository::{RefreshTokenRepository, UserRepository};

pub struct SeaOrmUserRepository {
    pub db: DatabaseConnection,
}

pub struct SeaOrmRefreshTokenRepository {
    pub db: DatabaseConnection,
}

fn to_user(u: &models::user::Model) -> AuthUser {
    AuthUser {
        id: u.id,
        username: u.username.clone(),
        email: u.email.clone(),
        full_name: u.full_name.clone(),
        is_active: u.is_active,
        created_at: u.created_at.with_timezone(&Utc),
    }
}

fn to_credentials(u: &models::user::Model) -> Credentials {
    Credentials { password_hash: u.password_hash.clone() }
}

fn to_record(t: models::refresh_token::Model) -> RefreshTokenRecord {
    RefreshTokenRecord {
        id: t.id,
        user_id: t.user_id,
        token_hash: t.token_hash,
        expires_at: t.expires_at.with_timezone(&Utc),
        revoked: t.revoked,
        created_at: t.created_at.with_timezone(&Utc),
    }
}

fn repo_err(e: ModelError) -> AuthError {
    AuthError::Repository(e.to_string())
}

/// A unique violation that slipped past the pre-checks (concurrent signup)
/// still surfaces as the matching business error.
fn create_err(e: ModelError) -> AuthError {
    match e {
        ModelError::UniqueViolation(detail) if detail.contains("username") => AuthError::UsernameTaken,
        ModelError::UniqueViolation(detail) if detail.contains("email") => AuthError::EmailTaken,
        ModelError::Validation(msg) => AuthError::Validation(msg),
        other => repo_err(other),
    }
}

#[async_trait::async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<(AuthUser, Credentials)>, AuthError> {
        let res = models::user::find_by_identifier(&self.db, identifier).await.map_err(repo_err)?;
        Ok(res.map(|u| (to_user(&u), to_credentials(&u))))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<AuthUser>, AuthError> {
        let res = models::user::find_by_username(&self.db, username).await.map_err(repo_err)?;
        Ok(res.as_ref().map(to_user))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError> {
        let res = models::user::find_by_email(&self.db, email).await.map_err(repo_err)?;
        Ok(res.as_ref().map(to_user))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, AuthError> {
        let res = models::user::find_by_id(&self.db, id).await.map_err(repo_err)?;
        Ok(res.as_ref().map(to_user))
    }

    async fn create_user(&self, record: NewUserRecord) -> Result<AuthUser, AuthError> {
        let new = models::user::NewUser {
            username: &record.username,
            email: &record.email,
            password_hash: record.password_hash,
            full_name: record.full_name.as_deref(),
        };
        let created = models::user::create(&self.db, new).await.map_err(create_err)?;
        Ok(to_user(&created))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<AuthUser>, AuthError> {
        let res = models::user::set_active(&self.db, id, active).await.map_err(repo_err)?;
        Ok(res.as_ref().map(to_user))
    }
}

#[async_trait::async_trait]
impl RefreshTokenRepository for SeaOrmRefreshTokenRepository {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AuthError> {
        let row = models::refresh_token::insert(&self.db, token.user_id, token.token_hash, token.expires_at)
            .await
            .map_err(repo_err)?;
        Ok(to_record(row))
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let res = models::refresh_token::find_by_hash(&self.db, token_hash).await.map_err(repo_err)?;
        Ok(res.map(to_record))
    }

    async fn rotate(&self, old_hash: &str, successor: NewRefreshToken) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let txn = self.db.begin().await.map_err(|e| AuthError::Repository(e.to_string()))?;
        let won = models::refresh_token::mark_revoked(&txn, old_hash).await.map_err(repo_err)?;
        if !won {
            txn.rollback().await.map_err(|e| AuthError::Repository(e.to_string()))?;
            return Ok(None);
        }
        // dropping `txn` on an insert error rolls the revocation back
        let row = models::refresh_token::insert(&txn, successor.user_id, successor.token_hash, successor.expires_at)
            .await
            .map_err(repo_err)?;
        txn.commit().await.map_err(|e| AuthError::Repository(e.to_string()))?;
        Ok(Some(to_record(row)))
    }

    async fn revoke(&self, token_hash: &str) -> Result<bool, AuthError> {
        models::refresh_token::mark_revoked(&self.db, token_hash).await.map_err(repo_err)
    }
}
