//! 错误定义模块

use thiserror::Error;

/// 客户端统一错误类型
#[derive(Error, Debug)]
pub enum BreathDxError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("文档存储错误: {0}")]
    Store(String),

    #[error("文档写入失败: {path}")]
    WriteFailed { path: String },

    #[error("工作流错误: {0}")]
    Workflow(String),

    #[error("无效阶段转换: 从 {from} 到 {event}")]
    InvalidPhaseTransition { from: String, event: String },

    #[error("导出错误: {0}")]
    Export(String),

    #[error("采集已取消")]
    Cancelled,

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 客户端统一结果类型
pub type Result<T> = std::result::Result<T, BreathDxError>;
