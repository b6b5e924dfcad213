// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::config::settings::DatabaseSettings;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;
use tracing::{info, warn};

/// 创建数据库连接池
///
/// # 参数
///
/// * `settings` - 数据库配置
///
/// # 返回值
///
/// * `Ok(DatabaseConnection)` - 数据库连接
/// * `Err(DbErr)` - 连接过程中出现的错误
pub async fn create_pool(settings: &DatabaseSettings) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(settings.url.to_owned());

    if let Some(max) = settings.max_connections {
        opt.max_connections(max);
    }

    if let Some(min) = settings.min_connections {
        opt.min_connections(min);
    }

    if let Some(timeout) = settings.connect_timeout {
        opt.connect_timeout(Duration::from_secs(timeout));
        opt.acquire_timeout(Duration::from_secs(timeout));
    }

    if let Some(idle) = settings.idle_timeout {
        opt.idle_timeout(Duration::from_secs(idle));
    }

    opt.max_lifetime(Duration::from_secs(3600))
        .sqlx_logging(false);

    Database::connect(opt).await
}

/// 等待数据库可用
///
/// # 参数
///
/// * `settings` - 数据库配置
/// * `retries` - 最大尝试次数
/// * `delay` - 每次失败后的等待时间
pub async fn wait_for_database(
    settings: &DatabaseSettings,
    retries: u32,
    delay: Duration,
) -> Result<DatabaseConnection, DbErr> {
    let retries = retries.max(1);
    let mut attempt = 1;
    loop {
        match create_pool(settings).await {
            Ok(db) => match db.ping().await {
                Ok(()) => {
                    info!("sync DB is ready.");
                    return Ok(db);
                }
                Err(e) if attempt >= retries => return Err(e),
                Err(e) => warn!("Waiting for sync DB... ({}/{}): {}", attempt, retries, e),
            },
            Err(e) if attempt >= retries => return Err(e),
            Err(e) => warn!("Waiting for sync DB... ({}/{}): {}", attempt, retries, e),
        }
        attempt += 1;
        tokio::time::sleep(delay).await;
    }
}

/// 执行所有未应用的迁移
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(db, None).await?;
    info!("Database migrations applied");
    Ok(())
}
