// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use repairshopr_sync::config::settings::Settings;
use repairshopr_sync::infrastructure::database::connection;
use repairshopr_sync::infrastructure::metrics::init_metrics;
use repairshopr_sync::infrastructure::process::CommandLauncher;
use repairshopr_sync::infrastructure::repositories::sync_status_repo_impl::SyncStatusRepositoryImpl;
use repairshopr_sync::utils::telemetry::init_telemetry;
use repairshopr_sync::workers::watchdog::{StoreStatusProbe, SyncSupervisor, Watchdog, WatchdogConfig};
use tracing::info;

const SYNC_BINARY: &str = "repairshopr-sync";

/// 循环启动同步进程并用看门狗监管
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new()?;
    init_telemetry(&settings.logging);
    init_metrics(&settings.metrics);

    let watchdog_settings = &settings.watchdog;
    let db = connection::wait_for_database(
        &settings.database,
        watchdog_settings.db_wait_retries,
        Duration::from_secs(watchdog_settings.db_wait_seconds),
    )
    .await?;
    connection::run_migrations(&db).await?;
    let db = Arc::new(db);

    let launcher = match watchdog_settings
        .command
        .as_deref()
        .and_then(CommandLauncher::from_command_line)
    {
        Some(launcher) => launcher,
        None => CommandLauncher::sibling(SYNC_BINARY)?,
    };
    info!(
        "Watchdog enabled={} poll={}s max_stale_count={} stale_heartbeat={}s",
        watchdog_settings.enabled,
        watchdog_settings.poll_seconds,
        watchdog_settings.max_stale_count,
        watchdog_settings.stale_heartbeat_seconds
    );

    let probe = StoreStatusProbe::new(
        Arc::new(SyncStatusRepositoryImpl::new(db)),
        watchdog_settings.stale_heartbeat_seconds,
    );
    let watchdog = Watchdog::new(Arc::new(probe), WatchdogConfig::from(watchdog_settings));
    let supervisor = SyncSupervisor::new(
        Arc::new(launcher),
        watchdog,
        Duration::from_secs(watchdog_settings.interval_seconds),
        Duration::from_secs(watchdog_settings.failure_sleep_seconds),
    );

    supervisor.run(None).await;
    Ok(())
}
