// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了同步系统的核心数据结构，包括：
/// - 领域记录（record）：规范化后的厂商记录
/// - 同步周期（sync_cycle）：周期状态机
/// - 状态报告（status_report）：对外发布的只读状态
/// - 对账报告（parity）：周期结束后的完整性校验结果
/// - 注册表（registry）：模型名到结构和分页策略的映射
pub mod parity;
pub mod record;
pub mod registry;
pub mod status_report;
pub mod sync_cycle;
