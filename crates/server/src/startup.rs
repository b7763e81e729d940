use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use configs::AppConfig;
use migration::MigratorTrait;
use service::auth::{
    repo::{SeaOrmRefreshTokenRepository, SeaOrmUserRepository},
    AuthConfig, AuthService,
};
use tracing::info;

use crate::errors::StartupError;
use crate::routes::{self, auth::ServerState};

/// Connect, migrate and wire the auth service from validated settings.
pub async fn build_state(cfg: &AppConfig) -> Result<ServerState, StartupError> {
    let db = models::db::connect_with_config(&cfg.database)
        .await
        .map_err(|e| StartupError::Database(e.to_string()))?;
    migration::Migrator::up(&db, None)
        .await
        .map_err(|e| StartupError::Database(e.to_string()))?;

    let auth_cfg = AuthConfig::from_settings(&cfg.auth).map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    let users = Arc::new(SeaOrmUserRepository { db: db.clone() });
    let tokens = Arc::new(SeaOrmRefreshTokenRepository { db });
    let auth = AuthService::new(users, tokens, auth_cfg).map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    Ok(ServerState { auth: Arc::new(auth) })
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(service = "server", event = "shutdown_signal", "received Ctrl+C, draining connections");
    }
}

/// Public entry: build the app and run the HTTP server until Ctrl+C
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let state = build_state(&cfg).await?;
    let app: Router = routes::build_router(state);

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port).parse()?;
    info!(%addr, env = ?cfg.env, "starting server crate");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}
