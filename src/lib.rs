// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 运维用例，例如子集合对账
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 同步周期、记录模型、规范化和仓库接口
pub mod domain;

/// 引擎模块
///
/// 厂商 API 的传输、限流重试、缓存客户端和分页
pub mod engines;

/// 基础设施模块
///
/// 数据库、响应缓存、指标和子进程管理
pub mod infrastructure;

/// 工具模块
///
/// 错误类型、重试策略和日志初始化
pub mod utils;

/// 工作器模块
///
/// 同步编排和看门狗
pub mod workers;
