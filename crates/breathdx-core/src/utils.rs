//! 通用工具函数

use crate::value::Value;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// 患者编号前缀
pub const PATIENT_ID_PREFIX: &str = "P-";

/// 生成患者编号，如 `P-6`
pub fn patient_id(number: u64) -> String {
    format!("{}{}", PATIENT_ID_PREFIX, number)
}

/// 解析患者编号中的序号，取第一个 `-` 之后的前导数字
pub fn patient_number(id: &str) -> Option<u64> {
    let suffix = id.split('-').nth(1)?;
    let digits: String = suffix.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// 会话编号，三位补零
pub fn session_id(number: usize) -> String {
    format!("sessionID_{:03}", number)
}

/// 子会话编号，三位补零
pub fn subsession_id(number: usize) -> String {
    format!("subsession_{:03}", number)
}

/// 保留两位小数
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 算术平均，空输入返回 None
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// 当前时间的 ISO-8601 表示（毫秒精度，UTC）
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 解析存储中的时间戳
///
/// 时间戳可能以三种形式出现：ISO 字符串、数值毫秒时间戳、带 `seconds`（或 `_seconds`）的映射。
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) | Value::Timestamp(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Integer(millis) => Utc.timestamp_millis_opt(*millis).single(),
        Value::Double(millis) => Utc.timestamp_millis_opt(*millis as i64).single(),
        Value::Map(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_f64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_i64)
                .unwrap_or_default();
            Utc.timestamp_opt(seconds as i64, nanos.clamp(0, 999_999_999) as u32)
                .single()
        }
        Value::Boolean(_) => None,
    }
}

/// 时间戳的显示文本，缺失时为 `N/A`
pub fn display_timestamp(value: Option<&Value>) -> String {
    match value {
        None => "N/A".to_string(),
        Some(v) => match parse_timestamp(v) {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => match v {
                Value::String(s) | Value::Timestamp(s) => s.clone(),
                _ => "N/A".to_string(),
            },
        },
    }
}
