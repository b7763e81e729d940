#![cfg(test)]
use std::sync::Arc;

use configs::DatabaseConfig;
use migration::MigratorTrait;
use models::db::connect_with_config;
use sea_orm::DatabaseConnection;

use crate::auth::domain::{LoginInput, SignupInput};
use crate::auth::errors::AuthError;
use crate::auth::password;
use crate::auth::repo::{SeaOrmRefreshTokenRepository, SeaOrmUserRepository};
use crate::auth::repository::UserRepository;
use crate::auth::{AuthConfig, AuthService};

/// Fresh in-memory database per test, migrations applied
pub async fn get_db() -> Result<DatabaseConnection, anyhow::Error> {
    let db = connect_with_config(&DatabaseConfig::sqlite_memory()).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// File-backed database with a real pool, for tests that need more than one
/// connection. Keep the returned directory alive for the test's duration.
pub async fn get_file_db(max_connections: u32) -> Result<(tempfile::TempDir, DatabaseConnection), anyhow::Error> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("auth.db").display());
    let cfg = DatabaseConfig { url, max_connections, min_connections: 1, ..DatabaseConfig::default() };
    let db = connect_with_config(&cfg).await?;
    migration::Migrator::up(&db, None).await?;
    Ok((dir, db))
}

pub type SeaOrmAuthService = AuthService<SeaOrmUserRepository, SeaOrmRefreshTokenRepository>;

pub fn seaorm_service(db: &DatabaseConnection) -> Result<SeaOrmAuthService, anyhow::Error> {
    let users = Arc::new(SeaOrmUserRepository { db: db.clone() });
    let tokens = Arc::new(SeaOrmRefreshTokenRepository { db: db.clone() });
    Ok(AuthService::new(users, tokens, AuthConfig::with_secret("test-secret"))?)
}

#[tokio::test]
async fn seaorm_scenario_end_to_end() {
    let db = get_db().await.unwrap();
    let s = seaorm_service(&db).unwrap();
    let input = SignupInput { username: "alice".into(), email: "alice@x.com".into(), password: "pw1".into(), full_name: Some("Alice".into()) };
    let alice = s.signup(input).await.unwrap();
    assert_eq!(alice.full_name.as_deref(), Some("Alice"));

    let row = models::user::find_by_username(&db, "alice").await.unwrap().unwrap();
    assert_ne!(row.password_hash, "pw1");
    assert!(row.password_hash.starts_with("$argon2"));
    assert!(password::verify("pw1", &row.password_hash));
    assert!(!password::verify("pw2", &row.password_hash));
    assert!(!password::verify("", &row.password_hash));

    let dup = SignupInput { username: "alice".into(), email: "other@x.com".into(), password: "pw2".into(), full_name: None };
    assert!(matches!(s.signup(dup).await, Err(AuthError::UsernameTaken)));

    let first = s.login(LoginInput { identifier: "alice@x.com".into(), password: "pw1".into() }).await.unwrap();
    let second = s.refresh(&first.refresh_token).await.unwrap();
    assert_ne!(first.refresh_token, second.refresh_token);
    assert!(matches!(s.refresh(&first.refresh_token).await, Err(AuthError::InvalidRefreshToken)));

    s.logout(&second.refresh_token).await.unwrap();
    s.logout(&second.refresh_token).await.unwrap();
    assert!(matches!(s.refresh(&second.refresh_token).await, Err(AuthError::InvalidRefreshToken)));
}

#[tokio::test]
async fn seaorm_unique_violation_maps_to_business_errors() {
    let db = get_db().await.unwrap();
    let repo = SeaOrmUserRepository { db };
    let record = |username: &str, email: &str| crate::auth::domain::NewUserRecord {
        username: username.into(),
        email: email.into(),
        password_hash: "$argon2id$stub".into(),
        full_name: None,
    };
    repo.create_user(record("bob", "bob@x.com")).await.unwrap();
    assert!(matches!(repo.create_user(record("bob", "new@x.com")).await, Err(AuthError::UsernameTaken)));
    assert!(matches!(repo.create_user(record("bobby", "bob@x.com")).await, Err(AuthError::EmailTaken)));
}

#[tokio::test]
async fn seaorm_rotation_is_single_use_and_stores_digest_only() {
    use crate::auth::refresh::RefreshTokenStore;
    use crate::auth::repository::RefreshTokenRepository;

    let db = get_db().await.unwrap();
    let users = SeaOrmUserRepository { db: db.clone() };
    let owner = users
        .create_user(crate::auth::domain::NewUserRecord {
            username: "cy".into(),
            email: "cy@x.com".into(),
            password_hash: "$argon2id$stub".into(),
            full_name: None,
        })
        .await
        .unwrap();
    let repo = Arc::new(SeaOrmRefreshTokenRepository { db });
    let store = RefreshTokenStore::new(repo.clone(), "k", chrono::Duration::days(1)).unwrap();

    let issued = store.issue(owner.id).await.unwrap();
    assert!(repo.find_by_hash(&issued.token).await.unwrap().is_none());
    let record = repo.find_by_hash(&store.digest(&issued.token)).await.unwrap().unwrap();
    assert!(!record.revoked);

    assert!(store.rotate_from(&record).await.unwrap().is_some());
    assert!(store.rotate_from(&record).await.unwrap().is_none());
    assert!(store.validate(&issued.token).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn seaorm_concurrent_rotation_has_one_winner() {
    let (_dir, db) = get_file_db(2).await.unwrap();
    let s = Arc::new(seaorm_service(&db).unwrap());
    let input = SignupInput { username: "dee".into(), email: "dee@x.com".into(), password: "pw".into(), full_name: None };
    let dee = s.signup(input).await.unwrap();
    let token = s.login(LoginInput { identifier: "dee".into(), password: "pw".into() }).await.unwrap().refresh_token;

    let (a, b) = tokio::join!(
        { let s = s.clone(); let t = token.clone(); tokio::spawn(async move { s.refresh(&t).await }) },
        { let s = s.clone(); let t = token.clone(); tokio::spawn(async move { s.refresh(&t).await }) },
    );
    let results = [a.unwrap(), b.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(AuthError::InvalidRefreshToken))));

    // the login token plus exactly one successor, and only the successor is live
    let rows = models::refresh_token::list_for_user(&db, dee.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.iter().filter(|r| !r.revoked).count(), 1);
}
