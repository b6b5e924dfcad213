// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 单个子集合的聚合对账结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionParity {
    /// 子模型名
    pub collection: String,
    /// 厂商报告的数量
    pub expected: u64,
    /// 本地数量
    pub actual: u64,
    /// `actual - expected`
    pub delta: i64,
    /// 允许的偏差
    pub allowed: u64,
}

impl CollectionParity {
    pub fn new(collection: impl Into<String>, expected: u64, actual: u64, allowed: u64) -> Self {
        Self {
            collection: collection.into(),
            expected,
            actual,
            delta: actual as i64 - expected as i64,
            allowed,
        }
    }

    pub fn within_tolerance(&self) -> bool {
        self.delta.unsigned_abs() <= self.allowed
    }
}

/// 抽样父记录的子数量不一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMismatch {
    pub collection: String,
    pub parent_id: i64,
    pub expected: u64,
    pub actual: u64,
}

/// 周期对账报告
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParityReport {
    pub collections: Vec<CollectionParity>,
    pub mismatches: Vec<SampleMismatch>,
    /// 实际抽样的父记录数
    pub sampled_parents: usize,
    /// 超出保留上限而被丢弃的不一致数
    pub dropped_mismatches: usize,
}

impl ParityReport {
    /// 记录一条抽样不一致，超出上限时只计数
    pub fn push_mismatch(&mut self, mismatch: SampleMismatch, max_kept: usize) {
        if self.mismatches.len() < max_kept {
            self.mismatches.push(mismatch);
        } else {
            self.dropped_mismatches += 1;
        }
    }

    pub fn has_violations(&self) -> bool {
        self.collections.iter().any(|c| !c.within_tolerance())
            || !self.mismatches.is_empty()
            || self.dropped_mismatches > 0
    }

    /// 单行摘要，用于日志和 `last_error`
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = self
            .collections
            .iter()
            .filter(|c| !c.within_tolerance())
            .map(|c| {
                format!(
                    "{} expected={} actual={} delta={} allowed={}",
                    c.collection, c.expected, c.actual, c.delta, c.allowed
                )
            })
            .collect();

        let total_mismatches = self.mismatches.len() + self.dropped_mismatches;
        if total_mismatches > 0 {
            let examples: Vec<String> = self
                .mismatches
                .iter()
                .take(5)
                .map(|m| format!("{}:{} {}!={}", m.collection, m.parent_id, m.actual, m.expected))
                .collect();
            parts.push(format!(
                "{} of {} sampled parents mismatched [{}]",
                total_mismatches,
                self.sampled_parents,
                examples.join(", ")
            ));
        }

        if parts.is_empty() {
            "parity ok".to_string()
        } else {
            parts.join("; ")
        }
    }
}
