// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 用例模块
///
/// 子集合对账与修复、同步数据清空
pub mod flush_use_case;
pub mod reconcile_use_case;
