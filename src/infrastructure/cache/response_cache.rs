// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::engines::traits::QueryParams;

/// 分页元数据
///
/// 厂商的 `meta` 字段类型不稳定，数值可能是整数、浮点或数字字符串
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMeta {
    /// 总页数
    pub total_pages: Option<u32>,
    /// 总条目数
    pub total_entries: Option<u64>,
    /// 原始元数据
    pub raw: Map<String, Value>,
}

impl PageMeta {
    /// 从原始 `meta` 对象解析
    pub fn from_map(raw: Map<String, Value>) -> Self {
        let total_pages = raw
            .get("total_pages")
            .and_then(coerce_u64)
            .and_then(|v| u32::try_from(v).ok());
        let total_entries = raw.get("total_entries").and_then(coerce_u64);
        Self {
            total_pages,
            total_entries,
            raw,
        }
    }

    /// 构造预取时写入缓存的元数据
    pub fn seeded(total_pages: u32, total_entries: u64) -> Self {
        let mut raw = Map::new();
        raw.insert("total_pages".to_string(), Value::from(total_pages));
        raw.insert("total_entries".to_string(), Value::from(total_entries));
        Self {
            total_pages: Some(total_pages),
            total_entries: Some(total_entries),
            raw,
        }
    }

    /// 附加一个字段（预取阶段标记等）
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.raw.insert(key.to_string(), value);
        self
    }
}

fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                s.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// 缓存条目
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    /// 列表结果
    List {
        rows: Vec<Value>,
        meta: Option<PageMeta>,
    },
    /// 单个对象
    Object(Map<String, Value>),
}

/// 列表请求的缓存键
///
/// 对排序后的参数做 SHA-256，只保留前 16 位十六进制
pub fn list_key(model: &str, params: &QueryParams) -> String {
    let encoded = serde_urlencoded::to_string(params).unwrap_or_else(|_| format!("{:?}", params));
    let digest = Sha256::digest(encoded.as_bytes());
    let hash = hex::encode(digest);
    format!("{}_list_{}", model, &hash[..16])
}

/// 单对象请求的缓存键
pub fn object_key(model: &str, id: i64) -> String {
    format!("{}_{}", model, id)
}

/// 响应缓存
///
/// 生命周期为一个同步周期，由客户端实例独占
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取缓存值
    pub fn get(&mut self, key: &str) -> Option<&CacheEntry> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                debug!("cache hit: {}", key);
                Some(entry)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// 是否存在缓存，不计入命中统计
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 设置缓存值
    pub fn insert(&mut self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    /// 清空缓存
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 命中与未命中次数
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
