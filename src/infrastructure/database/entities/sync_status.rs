// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 状态记录只有一行
pub const STATUS_ROW_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_status")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub cycle_id: Option<String>,
    pub status: String,
    pub mode: Option<String>,
    pub current_model: Option<String>,
    pub current_page: Option<i32>,
    pub records_processed: i64,
    pub cycle_started_at: Option<ChronoDateTimeWithTimeZone>,
    pub cycle_finished_at: Option<ChronoDateTimeWithTimeZone>,
    pub last_heartbeat: Option<ChronoDateTimeWithTimeZone>,
    pub last_error: Option<String>,
    pub updated_at: Option<ChronoDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
