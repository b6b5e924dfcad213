// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 定义记录、同步状态和水位线的持久化抽象
pub mod checkpoint_repository;
pub mod record_repository;
pub mod sync_status_repository;
