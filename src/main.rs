// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::process::ExitCode;
use std::sync::Arc;

use repairshopr_sync::config::settings::Settings;
use repairshopr_sync::engines::api_client::VendorClient;
use repairshopr_sync::infrastructure::database::connection;
use repairshopr_sync::infrastructure::metrics::init_metrics;
use repairshopr_sync::infrastructure::repositories::checkpoint_repo_impl::CheckpointRepositoryImpl;
use repairshopr_sync::infrastructure::repositories::record_repo_impl::RecordRepositoryImpl;
use repairshopr_sync::infrastructure::repositories::sync_status_repo_impl::SyncStatusRepositoryImpl;
use repairshopr_sync::utils::telemetry::init_telemetry;
use repairshopr_sync::workers::sync_orchestrator::{OrchestratorConfig, SyncOrchestrator};
use tracing::{error, info};

/// 主函数
///
/// 执行一个同步周期，失败时以非零状态退出
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    // 1. Load configuration
    let settings = Settings::new()?;
    init_telemetry(&settings.logging);
    init_metrics(&settings.metrics);
    info!("Starting repairshopr-sync...");

    // 2. Connect to database
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    connection::run_migrations(db.as_ref()).await?;

    // 3. Build the vendor client and repositories
    let client = VendorClient::from_settings(&settings)?;
    let mut orchestrator = SyncOrchestrator::new(
        client,
        Arc::new(RecordRepositoryImpl::new(db.clone())),
        Arc::new(SyncStatusRepositoryImpl::new(db.clone())),
        Arc::new(CheckpointRepositoryImpl::new(db.clone())),
        OrchestratorConfig::from(&settings.sync),
    );

    // 4. Run one cycle
    match orchestrator.run_cycle().await {
        Ok(summary) => {
            info!(
                "Sync cycle {} finished with {} records",
                summary.cycle.cycle_id.as_deref().unwrap_or("-"),
                summary.cycle.records_processed
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Sync cycle failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
