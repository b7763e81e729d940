use anyhow::Result;
use configs::DatabaseConfig;
use migration::MigratorTrait;
use sea_orm::DatabaseConnection;

use crate::db::connect_with_config;

/// Database connection and configuration tests
pub mod db_tests;

/// CRUD operations tests for users and refresh tokens
pub mod crud_tests;


/// Fresh in-memory SQLite database with all migrations applied
pub(crate) async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = connect_with_config(&DatabaseConfig::sqlite_memory()).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}
