// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 组合领域服务、厂商客户端和仓库的运维用例
pub mod use_cases;
