use anyhow::Result;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::setup_test_db;
use crate::errors::ModelError;
use crate::{refresh_token, user};

fn new_user<'a>(username: &'a str, email: &'a str) -> user::NewUser<'a> {
    user::NewUser { username, email, password_hash: "$argon2id$stub".into(), full_name: Some("Test User") }
}

/// Test user CRUD operations
#[tokio::test]
async fn test_user_crud() -> Result<()> {
    let db = setup_test_db().await?;

    let created = user::create(&db, new_user("alice", "alice@x.com")).await?;
    assert!(created.is_active);
    assert_eq!(created.full_name.as_deref(), Some("Test User"));

    let by_id = user::find_by_id(&db, created.id).await?.expect("by id");
    assert_eq!(by_id.username, "alice");
    let by_name = user::find_by_username(&db, "alice").await?.expect("by username");
    assert_eq!(by_name.id, created.id);
    let by_email = user::find_by_email(&db, "alice@x.com").await?.expect("by email");
    assert_eq!(by_email.id, created.id);
    assert!(user::find_by_username(&db, "nobody").await?.is_none());

    let disabled = user::set_active(&db, created.id, false).await?.expect("exists");
    assert!(!disabled.is_active);
    let reloaded = user::find_by_id(&db, created.id).await?.expect("by id");
    assert!(!reloaded.is_active);
    assert!(user::set_active(&db, Uuid::new_v4(), false).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_user_validation() -> Result<()> {
    let db = setup_test_db().await?;
    let err = user::create(&db, new_user("  ", "a@x.com")).await.unwrap_err();
    assert!(matches!(err, ModelError::Validation(_)));
    let err = user::create(&db, new_user("bob", "not-an-email")).await.unwrap_err();
    assert!(matches!(err, ModelError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn test_unique_username_and_email() -> Result<()> {
    let db = setup_test_db().await?;
    user::create(&db, new_user("alice", "alice@x.com")).await?;

    let err = user::create(&db, new_user("alice", "other@x.com")).await.unwrap_err();
    match err {
        ModelError::UniqueViolation(detail) => assert!(detail.contains("username"), "{detail}"),
        other => panic!("expected unique violation, got {other:?}"),
    }
    let err = user::create(&db, new_user("alice2", "alice@x.com")).await.unwrap_err();
    match err {
        ModelError::UniqueViolation(detail) => assert!(detail.contains("email"), "{detail}"),
        other => panic!("expected unique violation, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_identifier_prefers_username_match() -> Result<()> {
    let db = setup_test_db().await?;
    // carol's email collides lexically with dave's username
    let carol = user::create(&db, new_user("carol", "dave@x.com")).await?;
    let dave = user::create(&db, new_user("dave@x.com", "dave@elsewhere.com")).await?;

    let hit = user::find_by_identifier(&db, "dave@x.com").await?.expect("match");
    assert_eq!(hit.id, dave.id);
    let hit = user::find_by_identifier(&db, "carol").await?.expect("match");
    assert_eq!(hit.id, carol.id);
    let hit = user::find_by_identifier(&db, "dave@elsewhere.com").await?.expect("match");
    assert_eq!(hit.id, dave.id);
    assert!(user::find_by_identifier(&db, "zed").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_refresh_token_crud() -> Result<()> {
    let db = setup_test_db().await?;
    let owner = user::create(&db, new_user("erin", "erin@x.com")).await?;
    let expires_at = Utc::now() + Duration::days(30);

    let row = refresh_token::insert(&db, owner.id, "digest-1".into(), expires_at).await?;
    assert!(!row.revoked);
    assert_eq!(row.expires_at.timestamp(), expires_at.timestamp());

    let found = refresh_token::find_by_hash(&db, "digest-1").await?.expect("stored");
    assert_eq!(found.id, row.id);
    assert_eq!(found.user_id, owner.id);
    assert!(refresh_token::find_by_hash(&db, "digest-unknown").await?.is_none());

    let err = refresh_token::insert(&db, owner.id, "digest-1".into(), expires_at).await.unwrap_err();
    assert!(matches!(err, ModelError::UniqueViolation(_)));

    refresh_token::insert(&db, owner.id, "digest-2".into(), expires_at).await?;
    let all = refresh_token::list_for_user(&db, owner.id).await?;
    assert_eq!(all.len(), 2);
    Ok(())
}
