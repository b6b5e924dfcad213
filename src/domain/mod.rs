// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含同步系统的核心业务逻辑，包括：
/// - 领域模型（models）：记录、同步周期和对账报告
/// - 规范化（normalizer）：原始数据到领域记录的转换
/// - 仓库接口（repositories）：数据持久化抽象接口
/// - 服务（services）：心跳和对账规则
///
/// 领域层不依赖具体的存储实现。
pub mod models;
pub mod normalizer;
pub mod repositories;
pub mod services;
