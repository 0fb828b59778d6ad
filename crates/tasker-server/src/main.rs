mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tasker_api::credentials::{AuthConfig, CredentialManager};
use tasker_api::notify::{LogNotifier, Notifier, SendGridNotifier};
use tasker_api::{AppState, AppStateInner, build_router};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tasker_server=debug,tasker_api=debug,tasker_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = tasker_db::Database::open(&config.db_path)?;

    let notifier: Arc<dyn Notifier> = match &config.sendgrid_api_key {
        Some(key) => Arc::new(SendGridNotifier::new(key.clone(), config.mail_from.clone())),
        None => {
            info!("SENDGRID_API_KEY not set, notifications are only logged");
            Arc::new(LogNotifier)
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        credentials: CredentialManager::new(&AuthConfig {
            jwt_secret: config.jwt_secret.clone(),
        }),
        notifier,
    });

    let app = build_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Tasker listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
