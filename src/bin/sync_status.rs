// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use repairshopr_sync::config::settings::Settings;
use repairshopr_sync::domain::models::status_report::StatusReport;
use repairshopr_sync::domain::repositories::sync_status_repository::SyncStatusRepository;
use repairshopr_sync::infrastructure::database::connection;
use repairshopr_sync::infrastructure::repositories::sync_status_repo_impl::SyncStatusRepositoryImpl;
use repairshopr_sync::utils::telemetry::init_telemetry;

/// 停滞且要求失败时的退出码
const STALE_EXIT_CODE: u8 = 2;

/// 输出一行同步状态 JSON
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let settings = Settings::new()?;
    init_telemetry(&settings.logging);

    let db = Arc::new(connection::create_pool(&settings.database).await?);
    connection::run_migrations(db.as_ref()).await?;

    let repository = SyncStatusRepositoryImpl::new(db);
    let cycle = repository.load().await?;
    let report = StatusReport::build(
        cycle.as_ref(),
        Utc::now(),
        settings.status.stale_threshold_seconds,
    );
    println!("{}", report.to_json_line()?);

    if settings.status.fail_on_stale && report.is_stale {
        return Ok(ExitCode::from(STALE_EXIT_CODE));
    }
    Ok(ExitCode::SUCCESS)
}
