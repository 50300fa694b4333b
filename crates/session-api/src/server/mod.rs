//! Server setup and initialization
//!
//! Provides the application builder, the Postgres-backed state factory and
//! the server runner with graceful shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use session_common::{AppConfig, AppError, TokenIssuer};
use session_db::{
    create_pool, run_migrations, PgPasswordResetRepository, PgRefreshTokenRepository,
    PgStoreHealth, PgUserRepository,
};
use session_service::{LogMailer, MailDispatcher, ServiceContextBuilder};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::middleware::apply_middleware;
use crate::routes::create_router;
use crate::state::AppState;

/// Build the complete Axum application with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let router = create_router(&state);
    let router = apply_middleware(router, state.config());
    router.with_state(state)
}

/// Token issuer from the JWT settings
pub fn token_issuer(config: &AppConfig) -> Result<TokenIssuer, AppError> {
    TokenIssuer::new(
        &config.jwt.secret,
        config.jwt.access_token_expiry,
        config.jwt.refresh_token_expiry,
    )
}

/// Mail dispatcher over the logging transport
pub fn mail_dispatcher(config: &AppConfig) -> MailDispatcher {
    MailDispatcher::new(
        Arc::new(LogMailer::new(config.mail.from.clone())),
        config.mail.send_timeout(),
    )
}

/// Initialize all dependencies and create AppState
pub async fn create_app_state(config: AppConfig) -> Result<AppState, AppError> {
    // Create database pool
    info!("Connecting to PostgreSQL...");
    let db_config = session_db::DatabaseConfig::from(&config.database);
    let pool = create_pool(&db_config)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    info!("PostgreSQL connection established");

    if config.database.run_migrations {
        info!(dir = %config.database.migrations_dir, "Running migrations");
        run_migrations(&pool, &config.database.migrations_dir)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
    }

    // Build service context
    let service_context = ServiceContextBuilder::new()
        .user_repo(Arc::new(PgUserRepository::new(pool.clone())))
        .refresh_token_repo(Arc::new(PgRefreshTokenRepository::new(pool.clone())))
        .password_reset_repo(Arc::new(PgPasswordResetRepository::new(pool.clone())))
        .store_health(Arc::new(PgStoreHealth::new(pool)))
        .token_issuer(Arc::new(token_issuer(&config)?))
        .mail(mail_dispatcher(&config))
        .password_reset(config.password_reset.clone())
        .build()
        .map_err(|e| AppError::Config(e.to_string()))?;

    Ok(AppState::new(service_context, config))
}

/// Serve `app` on `listener` until `shutdown` resolves, then drain mail
///
/// Connections carry their peer address so the rate limiter can key on it.
pub async fn serve<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let grace = state.config().server.shutdown_timeout();
    let mail = state.service_context().mail().clone();
    let app = create_app(state);

    let addr = listener
        .local_addr()
        .map_err(|e| AppError::Config(format!("Failed to read local address: {e}")))?;
    info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    if !mail.shutdown(grace).await {
        warn!(stats = ?mail.stats(), "Exiting with undelivered mail");
    }
    info!("Server stopped");
    Ok(())
}

/// Run the HTTP server
pub async fn run_server(state: AppState) -> Result<(), AppError> {
    let addr = state.config().server.address();
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    serve(listener, state, shutdown_signal()).await
}

/// Run the complete server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let state = create_app_state(config).await?;
    run_server(state).await
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
