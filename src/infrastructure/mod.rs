// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，负责与外部系统的交互。
///
/// 包含的子模块：
/// - 缓存（cache）：周期内的响应缓存
/// - 数据库（database）：数据库连接、迁移和实体映射
/// - 指标（metrics）：Prometheus 导出器和指标说明
/// - 仓库实现（repositories）：领域仓库接口的具体实现
/// - 进程（process）：看门狗管理的同步子进程
///
/// 基础设施层依赖于领域层的抽象接口。
pub mod cache;
pub mod database;
pub mod metrics;
pub mod process;
pub mod repositories;
