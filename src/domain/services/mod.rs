// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// - 心跳（heartbeat）：状态写入节流规则
/// - 对账（parity_service）：容差计算和父记录抽样
pub mod heartbeat;
pub mod parity_service;
