//! 传输层错误

use breathdx_core::BreathDxError;
use thiserror::Error;

/// REST 文档存储的传输层错误，只在实现内部使用，跨过 `DocumentStore` 时折叠为布尔/空值
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("请求 {path} 返回状态码 {status}")]
    Status { status: u16, path: String },

    #[error("文档解码失败: {0}")]
    Decode(String),

    #[error("文档编码失败: {0}")]
    Encode(String),
}

impl From<StoreError> for BreathDxError {
    fn from(err: StoreError) -> Self {
        BreathDxError::Store(err.to_string())
    }
}
