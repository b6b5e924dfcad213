// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 对账规则
//!
//! 聚合数量使用绝对或相对容差带，抽样父记录要求子数量完全一致。

use std::collections::HashSet;

/// 允许的偏差：`max(absolute, ceil(expected * relative))`
pub fn allowed_tolerance(expected: u64, absolute: u64, relative: f64) -> u64 {
    let relative = (expected as f64 * relative.max(0.0)).ceil() as u64;
    absolute.max(relative)
}

/// 在有序 id 中均匀取 `count` 个，包含首尾
pub fn evenly_spaced(ids: &[i64], count: usize) -> Vec<i64> {
    if count == 0 || ids.is_empty() {
        return Vec::new();
    }
    if ids.len() <= count {
        return ids.to_vec();
    }
    if count == 1 {
        return vec![ids[ids.len() / 2]];
    }

    let last = ids.len() - 1;
    let mut picked: Vec<i64> = (0..count).map(|i| ids[i * last / (count - 1)]).collect();
    picked.dedup();
    picked
}

/// 合并最近更新的 id 和均匀分布的 id，去重并保持顺序
pub fn sample_parents(recent: &[i64], spread: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    recent
        .iter()
        .chain(spread.iter())
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}
