use async_trait::async_trait;
use uuid::Uuid;

use super::domain::{AuthUser, Credentials, NewRefreshToken, NewUserRecord, RefreshTokenRecord};
use super::errors::AuthError;

/// Credential store: user records and their password hashes.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Username-or-email lookup in one query; a username match takes precedence.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<(AuthUser, Credentials)>, AuthError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<AuthUser>, AuthError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, AuthError>;
    /// Fails with `UsernameTaken` / `EmailTaken` on a uniqueness conflict.
    async fn create_user(&self, record: NewUserRecord) -> Result<AuthUser, AuthError>;
    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<AuthUser>, AuthError>;
}

/// Refresh token store keyed by token digest.
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AuthError>;
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AuthError>;
    /// Atomically revoke `old_hash` (only if still unrevoked) and insert the
    /// successor. `None` means another caller revoked it first.
    async fn rotate(&self, old_hash: &str, successor: NewRefreshToken) -> Result<Option<RefreshTokenRecord>, AuthError>;
    /// Returns whether this call flipped the flag; unknown digests are `false`.
    async fn revoke(&self, token_hash: &str) -> Result<bool, AuthError>;
}

/// Simple in-memory mock repositories for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard};

    fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, AuthError> {
        m.lock().map_err(|_| AuthError::Repository("mock store poisoned".into()))
    }

    #[derive(Default)]
    pub struct MockUserRepository {
        users: Mutex<HashMap<Uuid, (AuthUser, Credentials)>>, // key: user id
    }

    impl MockUserRepository {
        /// Drop a user outright, leaving any refresh tokens behind.
        pub fn remove(&self, id: Uuid) -> bool {
            self.users.lock().map(|mut users| users.remove(&id).is_some()).unwrap_or(false)
        }
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn find_by_identifier(&self, identifier: &str) -> Result<Option<(AuthUser, Credentials)>, AuthError> {
            let users = lock(&self.users)?;
            let by_username = users.values().find(|(u, _)| u.username == identifier);
            let hit = by_username.or_else(|| users.values().find(|(u, _)| u.email == identifier));
            Ok(hit.cloned())
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<AuthUser>, AuthError> {
            let users = lock(&self.users)?;
            Ok(users.values().find(|(u, _)| u.username == username).map(|(u, _)| u.clone()))
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<AuthUser>, AuthError> {
            let users = lock(&self.users)?;
            Ok(users.values().find(|(u, _)| u.email == email).map(|(u, _)| u.clone()))
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, AuthError> {
            let users = lock(&self.users)?;
            Ok(users.get(&id).map(|(u, _)| u.clone()))
        }

        async fn create_user(&self, record: NewUserRecord) -> Result<AuthUser, AuthError> {
            let mut users = lock(&self.users)?;
            if users.values().any(|(u, _)| u.username == record.username) {
                return Err(AuthError::UsernameTaken);
            }
            if users.values().any(|(u, _)| u.email == record.email) {
                return Err(AuthError::EmailTaken);
            }
            let user = AuthUser {
                id: Uuid::new_v4(),
                username: record.username,
                email: record.email,
                full_name: record.full_name,
                is_active: true,
                created_at: chrono::Utc::now(),
            };
            let creds = Credentials { password_hash: record.password_hash };
            users.insert(user.id, (user.clone(), creds));
            Ok(user)
        }

        async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<AuthUser>, AuthError> {
            let mut users = lock(&self.users)?;
            Ok(users.get_mut(&id).map(|(u, _)| {
                u.is_active = active;
                u.clone()
            }))
        }
    }

    #[derive(Default)]
    pub struct MockRefreshTokenRepository {
        rows: Mutex<HashMap<String, RefreshTokenRecord>>, // key: token digest
    }

    impl MockRefreshTokenRepository {
        /// Number of rows ever issued for `user_id`, revoked or not.
        pub fn count_for_user(&self, user_id: Uuid) -> usize {
            self.rows
                .lock()
                .map(|rows| rows.values().filter(|r| r.user_id == user_id).count())
                .unwrap_or(0)
        }

        fn insert_locked(rows: &mut HashMap<String, RefreshTokenRecord>, token: NewRefreshToken) -> Result<RefreshTokenRecord, AuthError> {
            if rows.contains_key(&token.token_hash) {
                return Err(AuthError::Repository("duplicate token digest".into()));
            }
            let record = RefreshTokenRecord {
                id: Uuid::new_v4(),
                user_id: token.user_id,
                token_hash: token.token_hash,
                expires_at: token.expires_at,
                revoked: false,
                created_at: chrono::Utc::now(),
            };
            rows.insert(record.token_hash.clone(), record.clone());
            Ok(record)
        }
    }

    #[async_trait]
    impl RefreshTokenRepository for MockRefreshTokenRepository {
        async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AuthError> {
            let mut rows = lock(&self.rows)?;
            Self::insert_locked(&mut rows, token)
        }

        async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
            let rows = lock(&self.rows)?;
            Ok(rows.get(token_hash).cloned())
        }

        async fn rotate(&self, old_hash: &str, successor: NewRefreshToken) -> Result<Option<RefreshTokenRecord>, AuthError> {
            let mut rows = lock(&self.rows)?;
            match rows.get_mut(old_hash) {
                Some(old) if !old.revoked => old.revoked = true,
                _ => return Ok(None),
            }
            Self::insert_locked(&mut rows, successor).map(Some)
        }

        async fn revoke(&self, token_hash: &str) -> Result<bool, AuthError> {
            let mut rows = lock(&self.rows)?;
            Ok(match rows.get_mut(token_hash) {
                Some(row) if !row.revoked => {
                    row.revoked = true;
                    true
                }
                _ => false,
            })
        }
    }
}
