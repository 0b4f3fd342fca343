mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(dcsync_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = dcsync_db::PoolConfig::from_app_config(&config);
    let pool = dcsync_db::connect_pool(&config.database_url, pool_config).await?;
    dcsync_db::run_migrations(&pool).await?;

    let jobs = dcsync_core::load_sync_jobs(&config.jobs_path)?;
    let erp = Arc::new(dcsync_odoo::OdooClient::new(
        &dcsync_odoo::OdooSettings::from_app_config(&config),
    )?);
    let _scheduler = scheduler::build_scheduler(pool.clone(), erp, Arc::clone(&config), &jobs).await?;

    let auth = AuthState::from_env(matches!(config.env, dcsync_core::Environment::Development))?;
    let app = build_app(AppState { pool }, auth);

    tracing::info!(addr = %config.bind_addr, "dcsync-server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
