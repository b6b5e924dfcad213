// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use repairshopr_sync::application::use_cases::flush_use_case::FlushUseCase;
use repairshopr_sync::config::settings::Settings;
use repairshopr_sync::infrastructure::database::connection;
use repairshopr_sync::infrastructure::repositories::checkpoint_repo_impl::CheckpointRepositoryImpl;
use repairshopr_sync::infrastructure::repositories::record_repo_impl::RecordRepositoryImpl;
use repairshopr_sync::utils::telemetry::init_telemetry;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new()?;
    init_telemetry(&settings.logging);

    let db = Arc::new(connection::create_pool(&settings.database).await?);
    connection::run_migrations(db.as_ref()).await?;

    let use_case = FlushUseCase::new(
        Arc::new(RecordRepositoryImpl::new(db.clone())),
        Arc::new(CheckpointRepositoryImpl::new(db)),
    );
    let summary = use_case.run().await?;
    println!(
        "Deleted {} synced records; next sync runs in full mode (checkpoint cleared: {})",
        summary.records_deleted, summary.checkpoint_cleared
    );
    Ok(())
}
