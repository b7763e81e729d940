use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use super::domain::{NewRefreshToken, RefreshTokenRecord};
use super::errors::AuthError;
use super::repository::RefreshTokenRepository;

type HmacSha256 = Hmac<Sha256>;

/// Plaintext handed to the client exactly once.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Opaque refresh tokens persisted as keyed digests.
///
/// The plaintext never reaches storage; lookups digest the presented token
/// with the same key and match on the digest column.
pub struct RefreshTokenStore<R: RefreshTokenRepository> {
    repo: Arc<R>,
    mac: HmacSha256,
    ttl: chrono::Duration,
}

impl<R: RefreshTokenRepository> RefreshTokenStore<R> {
    pub fn new(repo: Arc<R>, secret: &str, ttl: chrono::Duration) -> Result<Self, AuthError> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AuthError::TokenError(e.to_string()))?;
        Ok(Self { repo, mac, ttl })
    }

    /// Hex HMAC-SHA256 of the token; deterministic for a given key.
    pub fn digest(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn fresh(&self, user_id: Uuid) -> Result<(IssuedRefreshToken, NewRefreshToken), AuthError> {
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::TokenError("refresh token expiry out of range".into()))?;
        let row = NewRefreshToken { user_id, token_hash: self.digest(&token), expires_at };
        Ok((IssuedRefreshToken { token, expires_at }, row))
    }

    pub async fn issue(&self, user_id: Uuid) -> Result<IssuedRefreshToken, AuthError> {
        let (issued, row) = self.fresh(user_id)?;
        self.repo.insert(row).await?;
        Ok(issued)
    }

    /// The stored record if the token is known, unrevoked and unexpired.
    pub async fn validate(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let found = self.repo.find_by_hash(&self.digest(token)).await?;
        Ok(found.filter(|r| r.is_usable_at(Utc::now())))
    }

    /// Revoke `record` and issue its successor in one step. `None` when a
    /// concurrent caller already consumed it.
    pub async fn rotate_from(&self, record: &RefreshTokenRecord) -> Result<Option<IssuedRefreshToken>, AuthError> {
        let (issued, row) = self.fresh(record.user_id)?;
        Ok(self.repo.rotate(&record.token_hash, row).await?.map(|_| issued))
    }

    pub async fn rotate(&self, token: &str) -> Result<Option<IssuedRefreshToken>, AuthError> {
        match self.validate(token).await? {
            Some(record) => self.rotate_from(&record).await,
            None => Ok(None),
        }
    }

    /// Idempotent; unknown tokens are ignored.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        self.repo.revoke(&self.digest(token)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repository::mock::MockRefreshTokenRepository;

    fn store(ttl: chrono::Duration) -> RefreshTokenStore<MockRefreshTokenRepository> {
        RefreshTokenStore::new(Arc::new(MockRefreshTokenRepository::default()), "k", ttl).unwrap()
    }

    #[test]
    fn digest_is_keyed_and_stable() {
        let a = store(chrono::Duration::days(1));
        let b = RefreshTokenStore::new(Arc::new(MockRefreshTokenRepository::default()), "other", chrono::Duration::days(1)).unwrap();
        assert_eq!(a.digest("tok"), a.digest("tok"));
        assert_ne!(a.digest("tok"), b.digest("tok"));
        assert_eq!(a.digest("tok").len(), 64);
    }

    #[tokio::test]
    async fn issue_validate_rotate() {
        let s = store(chrono::Duration::days(1));
        let uid = Uuid::new_v4();
        let first = s.issue(uid).await.unwrap();
        assert_eq!(first.token.len(), 32);
        assert_eq!(s.validate(&first.token).await.unwrap().unwrap().user_id, uid);

        let second = s.rotate(&first.token).await.unwrap().unwrap();
        assert_ne!(first.token, second.token);
        assert!(s.validate(&first.token).await.unwrap().is_none());
        assert!(s.validate(&second.token).await.unwrap().is_some());
        assert!(s.rotate(&first.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_record_cannot_rotate_twice() {
        let s = store(chrono::Duration::days(1));
        let t = s.issue(Uuid::new_v4()).await.unwrap();
        let record = s.validate(&t.token).await.unwrap().unwrap();
        assert!(s.rotate_from(&record).await.unwrap().is_some());
        assert!(s.rotate_from(&record).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unrepresentable_expiry_is_an_error() {
        let s = store(chrono::Duration::MAX);
        let uid = Uuid::new_v4();
        assert!(matches!(s.issue(uid).await, Err(AuthError::TokenError(_))));
        assert_eq!(s.repo.count_for_user(uid), 0);
    }

    #[tokio::test]
    async fn expired_and_revoked_are_invalid() {
        let s = store(chrono::Duration::seconds(-1));
        let t = s.issue(Uuid::new_v4()).await.unwrap();
        assert!(s.validate(&t.token).await.unwrap().is_none());

        let s = store(chrono::Duration::days(1));
        let t = s.issue(Uuid::new_v4()).await.unwrap();
        s.revoke(&t.token).await.unwrap();
        s.revoke(&t.token).await.unwrap();
        s.revoke("never-issued").await.unwrap();
        assert!(s.validate(&t.token).await.unwrap().is_none());
    }
}
