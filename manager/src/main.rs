// File: manager/src/main.rs
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use pve_autorestart::constants::cleanup;
use pve_autorestart::{
    ActionExecutor, ConfigManager, ControlPlane, Database, PveshControlPlane, RestartScheduler,
    SimpleOperationTracker,
};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("pve_autorestart=info".parse()?)
        .add_directive("tokio_cron_scheduler=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    info!("Starting Proxmox auto-restart manager");

    let config_dir = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let config_manager = ConfigManager::new(config_dir).await?;
    let config = config_manager.get_current_config();

    let database = Arc::new(Database::new(&config.database_path).await?);
    info!("Database initialized");

    let recovered = database
        .cleanup_stuck_pending_records(config.stuck_pending_minutes)
        .await?;
    if recovered > 0 {
        warn!("Failed {} audit records left pending by a previous run", recovered);
    }

    let control_plane: Arc<dyn ControlPlane> =
        Arc::new(PveshControlPlane::new(&config.control_plane));

    let operation_tracker = SimpleOperationTracker::new();
    info!("Operation tracker initialized");

    let executor = ActionExecutor::new(
        database.clone(),
        control_plane.clone(),
        operation_tracker.clone(),
        Duration::from_secs(config.action_timeout_seconds),
    );

    let scheduler = RestartScheduler::new(executor, config.tick_schedule.clone());
    scheduler.start().await?;

    // Start periodic operation cleanup
    let operation_tracker_clone = operation_tracker.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(cleanup::CLEANUP_INTERVAL_SECONDS));
        loop {
            interval.tick().await;
            let cleaned = operation_tracker_clone
                .cleanup_old_operations(cleanup::OPERATION_CLEANUP_HOURS)
                .await;
            if cleaned > 0 {
                warn!(
                    "Cleaned up {} stuck operations older than {} hours",
                    cleaned,
                    cleanup::OPERATION_CLEANUP_HOURS
                );
            }
        }
    });

    shutdown_signal().await;
    info!("Shutdown requested");

    scheduler.stop().await?;
    info!("Proxmox auto-restart manager stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
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
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
