//! # BreathDx管理模块
//!
//! 提供客户端配置管理与日志初始化

pub mod config;
pub mod logging;

pub use config::{
    AcquisitionConfig, ClientConfig, ConfigManager, ConfigValidator, ExportConfig, LoggingConfig,
    StoreConfig,
};
pub use logging::init_logging;
