// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static TZ_WITHOUT_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([+-]\d{2})(\d{2})$").expect("Failed to compile offset regex"));
static EXCESS_MICROS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\.\d{6})\d+").expect("Failed to compile fraction regex"));

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// 毫秒时间戳的判定阈值
const MILLIS_THRESHOLD: f64 = 10_000_000_000.0;

fn normalize(value: &str) -> String {
    let mut normalized = value.trim().to_string();
    if normalized.ends_with('Z') || normalized.ends_with('z') {
        normalized.pop();
        normalized.push_str("+00:00");
    }
    normalized = normalized.replace(" UTC", "+00:00").replace(" GMT", "+00:00");
    normalized = TZ_WITHOUT_COLON.replace(&normalized, "$1:$2").into_owned();
    EXCESS_MICROS.replace(&normalized, "$1").into_owned()
}

fn parse_candidate(candidate: &str) -> Option<DateTime<FixedOffset>> {
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, format) {
            return Some(dt);
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(candidate, format) {
            return Some(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    NaiveDate::parse_from_str(candidate, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
}

/// 解析厂商返回的时间字符串
///
/// 支持 `Z` 后缀、带或不带冒号的偏移、` UTC`/` GMT` 后缀、空格分隔，
/// 超过 6 位的小数秒会被截断。无时区的值按 UTC 处理。
pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = normalize(value);
    if let Some(dt) = parse_candidate(&normalized) {
        return Some(dt);
    }
    if normalized.contains(' ') {
        return parse_candidate(&normalized.replacen(' ', "T", 1));
    }
    None
}

/// 将 JSON 值转换为时间
///
/// 数值按 Unix 时间戳处理，大于 10^10 时视为毫秒
pub fn coerce_datetime(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => {
            let mut timestamp = n.as_f64()?;
            if timestamp > MILLIS_THRESHOLD {
                timestamp /= 1000.0;
            }
            let secs = timestamp.floor();
            let nanos = ((timestamp - secs) * 1_000_000_000.0).round() as u32;
            DateTime::from_timestamp(secs as i64, nanos.min(999_999_999)).map(|dt| dt.fixed_offset())
        }
        _ => None,
    }
}
