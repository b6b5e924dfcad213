// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 规范化模块
///
/// 字段名清理、时间解析和基于静态结构的记录构建
pub mod datetime;
pub mod hydrator;
pub mod keys;
pub mod shapes;

pub use hydrator::hydrate;
pub use keys::clean_key;
