// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 分层加载同步服务的配置：默认值、配置文件和 `REPAIRSHOPR_SYNC__` 环境变量
pub mod settings;
