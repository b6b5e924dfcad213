// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use repairshopr_sync::application::use_cases::reconcile_use_case::{
    ReconcileEvent, ReconcileOptions, ReconcileUseCase,
};
use repairshopr_sync::config::settings::Settings;
use repairshopr_sync::domain::models::registry::{parity_families, selected_models};
use repairshopr_sync::engines::api_client::VendorClient;
use repairshopr_sync::infrastructure::database::connection;
use repairshopr_sync::infrastructure::repositories::record_repo_impl::RecordRepositoryImpl;
use repairshopr_sync::utils::telemetry::init_telemetry;
use tracing::error;

/// 扫描发票明细并按配置修复
///
/// 选项来自 `reconcile.*` 配置，例如 `REPAIRSHOPR_SYNC__RECONCILE__APPLY=true`
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new()?;
    init_telemetry(&settings.logging);

    let db = Arc::new(connection::create_pool(&settings.database).await?);
    connection::run_migrations(db.as_ref()).await?;

    let family = parity_families(&selected_models(None))
        .into_iter()
        .find(|family| family.child_model() == "line_item")
        .context("line item collection is not registered")?;

    let mut use_case = ReconcileUseCase::new(
        VendorClient::from_settings(&settings)?,
        Arc::new(RecordRepositoryImpl::new(db)),
        family,
        ReconcileOptions::from(&settings.reconcile),
    );

    let stdout = std::io::stdout();
    let mut emit = |event: &ReconcileEvent| match event.to_json_line() {
        Ok(line) => {
            let mut out = stdout.lock();
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        }
        Err(e) => error!("Failed to encode reconcile event: {}", e),
    };
    use_case.run(&mut emit).await?;
    use_case.client().log_api_stats();
    Ok(())
}
