// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::{Map, Value};

use crate::domain::models::record::{DomainRecord, FieldValue};
use crate::domain::normalizer::datetime::coerce_datetime;
use crate::domain::normalizer::keys::clean_key;
use crate::domain::normalizer::shapes::{FieldKind, RecordShape};
use crate::engines::traits::FetchError;

/// 将原始行转换为领域记录
///
/// # 参数
///
/// * `shape` - 记录结构
/// * `raw` - 对象或数组形式的行
///
/// # 返回值
///
/// * `Ok(DomainRecord)` - 领域记录
/// * `Err(FetchError::MalformedPayload)` - 行既不是对象也不是数组
pub fn hydrate(shape: &'static RecordShape, raw: &Value) -> Result<DomainRecord, FetchError> {
    match raw {
        Value::Object(object) => Ok(hydrate_object(shape, object)),
        Value::Array(items) => {
            let object: Map<String, Value> = shape
                .positional
                .iter()
                .zip(items.iter())
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            Ok(hydrate_object(shape, &object))
        }
        other => Err(FetchError::malformed(format!(
            "Invalid item payload type for {}: {}",
            shape.name,
            type_name(other)
        ))),
    }
}

/// 将原始对象转换为领域记录
///
/// null 视为缺失；0、false 和空字符串原样保留。未声明的字段以原始数据保存。
pub fn hydrate_object(shape: &'static RecordShape, object: &Map<String, Value>) -> DomainRecord {
    let mut cleaned: Map<String, Value> = object
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (clean_key(key), value.clone()))
        .collect();

    let id = cleaned.remove("id").as_ref().and_then(coerce_integer).filter(|id| *id != 0);
    let mut record = DomainRecord::new(shape.name, id);

    for spec in shape.fields {
        match cleaned.remove(spec.name) {
            Some(value) => record.set(spec.name, coerce(spec.kind, value)),
            None if !spec.nullable => {
                if let Some(default) = default_for(spec.kind) {
                    record.set(spec.name, default);
                }
            }
            None => {}
        }
    }

    for (key, value) in cleaned {
        record.set(key, FieldValue::Raw(value));
    }

    record
}

fn coerce(kind: FieldKind, value: Value) -> FieldValue {
    match kind {
        FieldKind::Integer => match coerce_integer(&value) {
            Some(i) => FieldValue::Integer(i),
            None => FieldValue::Raw(value),
        },
        FieldKind::Float => match coerce_float(&value) {
            Some(f) => FieldValue::Float(f),
            None => FieldValue::Raw(value),
        },
        FieldKind::Bool => match &value {
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => FieldValue::Bool(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => FieldValue::Bool(false),
            _ => FieldValue::Raw(value),
        },
        FieldKind::Text => match value {
            Value::String(s) => FieldValue::Text(s),
            other => FieldValue::Raw(other),
        },
        FieldKind::DateTime => match coerce_datetime(&value) {
            Some(dt) => FieldValue::DateTime(dt),
            None => match value {
                Value::String(s) => FieldValue::Text(s),
                other => FieldValue::Raw(other),
            },
        },
        FieldKind::Json => FieldValue::Raw(value),
        FieldKind::Nested(shape) => match &value {
            Value::Object(object) => {
                let mut nested = Map::with_capacity(object.len() + 1);
                nested.insert("id".to_string(), Value::from(0));
                nested.extend(object.iter().map(|(k, v)| (k.clone(), v.clone())));
                FieldValue::Record(Box::new(hydrate_object(shape, &nested)))
            }
            _ => FieldValue::Raw(value),
        },
        FieldKind::NestedList(shape) => match &value {
            Value::Array(items) if items.iter().all(Value::is_object) => FieldValue::Records(
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|object| hydrate_object(shape, object))
                    .collect(),
            ),
            _ => FieldValue::Raw(value),
        },
    }
}

fn default_for(kind: FieldKind) -> Option<FieldValue> {
    match kind {
        FieldKind::Integer => Some(FieldValue::Integer(0)),
        FieldKind::Float => Some(FieldValue::Float(0.0)),
        FieldKind::Bool => Some(FieldValue::Bool(false)),
        FieldKind::Text => Some(FieldValue::Text(String::new())),
        _ => None,
    }
}

/// 整数、整值浮点或数字字符串
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "hydrator_test.rs"]
mod tests;
