//! # Tempo API Server
//!
//! The HTTP server for Tempo, a personal task-scheduling application:
//! task CRUD, authentication, a server-sent-events notification stream,
//! and the billing webhook.
//!
//! ## Startup order
//!
//! 1. Tracing and configuration (missing required env vars are fatal)
//! 2. Database pool and schema setup
//! 3. Broadcast channel and reminder scheduler
//! 4. Full task re-scan, re-arming every reminder
//! 5. Router and listener
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p tempo-api
//! ```

use std::sync::Arc;

use tempo_api::app::{build_router, AppState};
use tempo_api::config::Config;
use tempo_scheduler::{Broadcaster, NotificationScheduler};
use tempo_shared::db::{migrations, pool};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempo_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Tempo API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let db = pool::create_pool(pool::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;

    migrations::run_migrations(&db).await?;

    let broadcaster = Arc::new(Broadcaster::new());
    let scheduler = Arc::new(NotificationScheduler::new(Arc::clone(&broadcaster)));

    // Re-arm reminders for every stored task; timers do not survive restarts
    let scheduled = scheduler.schedule_all(&db).await?;
    tracing::info!(tasks = scheduled, "Reminder re-scan complete");

    let bind_address = config.bind_address();
    let state = AppState::new(db, config, scheduler, broadcaster);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
