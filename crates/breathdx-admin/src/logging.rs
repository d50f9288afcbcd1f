//! 日志初始化

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 构造过滤器：`RUST_LOG` 优先，其次是配置的级别
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", config.level, e)),
    }
}

/// 安装全局 fmt 订阅者，只应调用一次
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::debug!("Logging initialised at level {}", config.level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_config() {
        let config = LoggingConfig {
            level: "breathdx_store=debug,info".to_string(),
            ansi: false,
        };
        assert!(build_filter(&config).is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            ansi: false,
        };
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
