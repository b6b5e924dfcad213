// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ /]").expect("Failed to compile key regex"));
static LEADING_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-").expect("Failed to compile key regex"));
static TRAILING_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_$").expect("Failed to compile key regex"));

/// 规范化厂商字段名
///
/// 空格和斜杠替换为下划线；以 `-` 开头时替换为 `transport`；
/// 末尾下划线替换为 `_2`；`#` 替换为 `num`；最后转小写
pub fn clean_key(key: &str) -> String {
    let cleaned = SEPARATORS.replace_all(key, "_");
    let cleaned = LEADING_DASH.replace(&cleaned, "transport");
    let cleaned = TRAILING_UNDERSCORE.replace(&cleaned, "_2");
    cleaned.replace('#', "num").to_lowercase()
}
