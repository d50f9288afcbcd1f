//! 类型化字段线格式编解码
//!
//! 线格式中每个标量包装为 `{类型标签: 值}`，嵌套对象为 `{"mapValue": {"fields": {...}}}`。

use breathdx_core::{Document, Fields, Value};
use serde_json::{json, Map, Value as Json};
use tracing::trace;

use crate::error::StoreError;

pub const STRING_VALUE: &str = "stringValue";
pub const INTEGER_VALUE: &str = "integerValue";
pub const DOUBLE_VALUE: &str = "doubleValue";
pub const BOOLEAN_VALUE: &str = "booleanValue";
pub const TIMESTAMP_VALUE: &str = "timestampValue";
pub const MAP_VALUE: &str = "mapValue";

fn tagged(tag: &str, value: Json) -> Json {
    let mut wrapper = Map::new();
    wrapper.insert(tag.to_string(), value);
    Json::Object(wrapper)
}

/// 编码单个字段值
pub fn encode_value(value: &Value) -> Result<Json, StoreError> {
    let encoded = match value {
        Value::String(s) => tagged(STRING_VALUE, Json::from(s.as_str())),
        Value::Integer(i) => tagged(INTEGER_VALUE, Json::from(*i)),
        Value::Double(d) => {
            if !d.is_finite() {
                return Err(StoreError::Encode(format!("非有限浮点数: {}", d)));
            }
            tagged(DOUBLE_VALUE, Json::from(*d))
        }
        Value::Boolean(b) => tagged(BOOLEAN_VALUE, Json::from(*b)),
        Value::Timestamp(ts) => tagged(TIMESTAMP_VALUE, Json::from(ts.as_str())),
        Value::Map(fields) => tagged(MAP_VALUE, json!({ "fields": encode_fields(fields)? })),
    };
    Ok(encoded)
}

/// 编码字段集合
pub fn encode_fields(fields: &Fields) -> Result<Json, StoreError> {
    let mut encoded = Map::new();
    for (key, value) in fields {
        encoded.insert(key.clone(), encode_value(value)?);
    }
    Ok(Json::Object(encoded))
}

/// 写请求体 `{"fields": {...}}`
pub fn encode_document_body(fields: &Fields) -> Result<Json, StoreError> {
    Ok(json!({ "fields": encode_fields(fields)? }))
}

/// 解码单个字段值，不支持的类型标签返回 None
pub fn decode_value(wire: &Json) -> Option<Value> {
    let object = wire.as_object()?;

    if let Some(s) = object.get(STRING_VALUE) {
        return s.as_str().map(|s| Value::String(s.to_string()));
    }
    if let Some(i) = object.get(INTEGER_VALUE) {
        // 规范表示为十进制字符串，也接受 JSON 数值
        return match i {
            Json::String(s) => s.parse().ok().map(Value::Integer),
            Json::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Value::Integer),
            _ => None,
        };
    }
    if let Some(d) = object.get(DOUBLE_VALUE) {
        return match d {
            Json::Number(n) => n.as_f64().map(Value::Double),
            Json::String(s) => s.parse().ok().map(Value::Double),
            _ => None,
        };
    }
    if let Some(b) = object.get(BOOLEAN_VALUE) {
        return b.as_bool().map(Value::Boolean);
    }
    if let Some(ts) = object.get(TIMESTAMP_VALUE) {
        return ts.as_str().map(|s| Value::Timestamp(s.to_string()));
    }
    if let Some(map) = object.get(MAP_VALUE) {
        let fields = map
            .get("fields")
            .and_then(Json::as_object)
            .map(decode_fields)
            .unwrap_or_default();
        return Some(Value::Map(fields));
    }

    trace!("Skipping unsupported wire value: {}", wire);
    None
}

/// 解码字段集合，跳过无法识别的字段
pub fn decode_fields(fields: &Map<String, Json>) -> Fields {
    fields
        .iter()
        .filter_map(|(key, wire)| decode_value(wire).map(|value| (key.clone(), value)))
        .collect()
}

/// 解码文档，文档 id 取 `name` 的最后一段；没有 `fields` 的文档得到空字段集
pub fn decode_document(wire: &Json) -> Result<Document, StoreError> {
    let object = wire
        .as_object()
        .ok_or_else(|| StoreError::Decode("文档不是 JSON 对象".to_string()))?;

    let id = object
        .get("name")
        .and_then(Json::as_str)
        .and_then(|name| name.rsplit('/').next())
        .ok_or_else(|| StoreError::Decode("文档缺少 name 字段".to_string()))?
        .to_string();

    let fields = object
        .get("fields")
        .and_then(Json::as_object)
        .map(decode_fields)
        .unwrap_or_default();

    Ok(Document { id, fields })
}

/// 解码一页集合列举结果，返回文档和下一页令牌
pub fn decode_list_page(wire: &Json) -> Result<(Vec<Document>, Option<String>), StoreError> {
    let documents = match wire.get("documents") {
        Some(Json::Array(items)) => items
            .iter()
            .map(decode_document)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(StoreError::Decode("documents 不是数组".to_string())),
        None => Vec::new(),
    };

    let next_page_token = wire
        .get("nextPageToken")
        .and_then(Json::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    Ok((documents, next_page_token))
}
