// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// 字段值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<FixedOffset>),
    /// 嵌套对象
    Record(Box<DomainRecord>),
    /// 嵌套对象列表
    Records(Vec<DomainRecord>),
    /// 无法按声明类型解析的原始数据
    Raw(Value),
}

impl FieldValue {
    /// 转换为 JSON，时间统一为 RFC 3339 微秒精度
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::DateTime(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Micros, false)),
            FieldValue::Record(record) => record.to_json(),
            FieldValue::Records(records) => Value::Array(records.iter().map(DomainRecord::to_json).collect()),
            FieldValue::Raw(value) => value.clone(),
        }
    }
}

/// 领域记录
///
/// 由规范化器根据静态声明的结构生成。字段只保存已解析的数据，
/// 读取字段不会触发任何额外请求。
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRecord {
    /// 模型名
    pub model: &'static str,
    /// 记录 id，0 或缺失时为 `None`
    pub id: Option<i64>,
    fields: BTreeMap<String, FieldValue>,
}

impl DomainRecord {
    pub fn new(model: &'static str, id: Option<i64>) -> Self {
        Self {
            model,
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// 原始存储访问，只检查已解析的字段
    pub fn raw(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// 字段是否存在
    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(FieldValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn datetime(&self, name: &str) -> Option<DateTime<FixedOffset>> {
        match self.fields.get(name) {
            Some(FieldValue::DateTime(dt)) => Some(*dt),
            _ => None,
        }
    }

    /// 嵌套对象
    pub fn record(&self, name: &str) -> Option<&DomainRecord> {
        match self.fields.get(name) {
            Some(FieldValue::Record(record)) => Some(record),
            _ => None,
        }
    }

    /// 嵌套对象列表，字段缺失或未解析时为空
    pub fn records(&self, name: &str) -> &[DomainRecord] {
        match self.fields.get(name) {
            Some(FieldValue::Records(records)) => records,
            _ => &[],
        }
    }

    /// 嵌套集合字段是否已解析
    pub fn has_records(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(FieldValue::Records(_)))
    }

    /// 记录的 `updated_at`（UTC）
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.datetime("updated_at").map(|dt| dt.with_timezone(&Utc))
    }

    /// 转换为 JSON 对象
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        if let Some(id) = self.id {
            object.insert("id".to_string(), Value::from(id));
        }
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.to_json());
        }
        Value::Object(object)
    }

    /// 不含指定嵌套集合的 JSON，子记录单独存储
    pub fn to_json_without(&self, collections: &[&str]) -> Value {
        let mut value = self.to_json();
        if let Value::Object(object) = &mut value {
            for name in collections {
                object.remove(*name);
            }
        }
        value
    }
}
