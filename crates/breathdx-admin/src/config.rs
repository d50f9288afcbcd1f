//! 配置管理
//!
//! 可选的 TOML 配置文件加环境变量覆盖（`BREATHDX_STORE__API_KEY` 形式），各节都有默认值。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};
use anyhow::{Result, Context};
use tracing::{info, error};
use config::{Config, Environment, File};

use breathdx_store::RestStoreConfig;
use breathdx_workflow::{PhaseDurations, WorkflowSettings};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "BREATHDX";

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: Arc<RwLock<ClientConfig>>,
    /// 配置文件路径
    config_path: Option<String>,
    /// 配置验证器
    validator: ConfigValidator,
}

/// 客户端完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 文档存储
    pub store: StoreConfig,
    /// 采集时序
    pub acquisition: AcquisitionConfig,
    /// 导出
    pub export: ExportConfig,
    /// 日志
    pub logging: LoggingConfig,
}

/// 文档存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub project_id: String,
    /// 附加在每个请求上的 `key` 参数
    pub api_key: String,
    pub database: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// 列举集合时每页文档数
    pub page_size: u32,
}

/// 采集时序配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub calibrating_secs: u32,
    pub blowing_secs: u32,
    pub analyzing_secs: u32,
    pub processing_secs: u32,
    /// 一个节拍的毫秒数
    pub tick_millis: u64,
    /// 计算结果前的等待
    pub results_settle_millis: u64,
}

/// 导出配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: String,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别，`RUST_LOG` 存在时以其为准
    pub level: String,
    /// 彩色输出
    pub ansi: bool,
}

impl StoreConfig {
    pub fn to_rest_config(&self) -> RestStoreConfig {
        RestStoreConfig {
            base_url: self.base_url.clone(),
            project_id: self.project_id.clone(),
            database: self.database.clone(),
            api_key: self.api_key.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            page_size: self.page_size,
        }
    }
}

impl AcquisitionConfig {
    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            durations: PhaseDurations {
                calibrating: self.calibrating_secs,
                blowing: self.blowing_secs,
                analyzing: self.analyzing_secs,
                processing: self.processing_secs,
            },
            tick: Duration::from_millis(self.tick_millis),
            results_settle: Duration::from_millis(self.results_settle_millis),
        }
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: &'static str,
    /// 验证函数
    validator: fn(&ClientConfig) -> bool,
    /// 错误消息
    error_message: &'static str,
}

impl ConfigManager {
    /// 创建新的配置管理器，不给路径时只使用默认值和环境变量
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(str::to_string),
            validator,
        })
    }

    /// 加载配置
    fn load_config(config_path: Option<&str>) -> Result<ClientConfig> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: ClientConfig = settings.try_deserialize()
            .context("Failed to deserialize configuration")?;

        info!("Configuration loaded from: {}", config_path.unwrap_or("<defaults>"));
        Ok(config)
    }

    /// 获取配置
    pub async fn get_config(&self) -> ClientConfig {
        let config = self.config.read().await;
        config.clone()
    }

    /// 配置文件路径
    pub fn config_path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }

    /// 当前配置的 TOML 文本
    pub async fn to_toml(&self) -> Result<String> {
        let config = self.config.read().await;
        toml::to_string_pretty(&*config).context("Failed to serialize configuration")
    }

    /// 更新配置并保存
    pub async fn update_config(&self, new_config: ClientConfig) -> Result<()> {
        self.validator.validate(&new_config)?;

        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        self.save_config().await?;

        info!("Configuration updated successfully");
        Ok(())
    }

    /// 保存配置到文件，没有配置文件路径时什么也不做
    pub async fn save_config(&self) -> Result<()> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };

        let config_str = self.to_toml().await?;
        tokio::fs::write(path, config_str).await
            .context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", path);
        Ok(())
    }

    /// 按 `section.key` 路径读取配置值
    pub async fn get_value<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let config = self.config.read().await;
        let config_json = serde_json::to_value(&*config)
            .context("Failed to serialize config to JSON")?;

        let mut current = &config_json;
        for part in path.split('.') {
            current = current
                .get(part)
                .ok_or_else(|| anyhow::anyhow!("Configuration path not found: {}", path))?;
        }

        serde_json::from_value(current.clone())
            .context("Failed to deserialize configuration value")
    }

    /// 按 `section.key` 路径设置配置值并保存
    ///
    /// 原值为字符串时按原文保存，否则先按 JSON 解析（数字、布尔）。
    pub async fn set_value(&self, path: &str, raw: &str) -> Result<()> {
        if self.config_path.is_none() {
            anyhow::bail!("No configuration file to save {} into", path);
        }

        let mut config_json = serde_json::to_value(self.get_config().await)
            .context("Failed to serialize config to JSON")?;

        let slot = path
            .split('.')
            .try_fold(&mut config_json, |node, part| node.get_mut(part))
            .ok_or_else(|| anyhow::anyhow!("Configuration path not found: {}", path))?;
        *slot = if slot.is_string() {
            serde_json::Value::String(raw.to_string())
        } else {
            serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
        };

        let new_config: ClientConfig = serde_json::from_value(config_json)
            .with_context(|| format!("Invalid value for {}: {}", path, raw))?;
        self.update_config(new_config).await
    }
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "store.project_id",
                validator: |config| !config.store.project_id.trim().is_empty(),
                error_message: "Project id cannot be empty",
            },
            ValidationRule {
                field_path: "store.page_size",
                validator: |config| config.store.page_size > 0,
                error_message: "Page size cannot be 0",
            },
            ValidationRule {
                field_path: "acquisition.tick_millis",
                validator: |config| config.acquisition.tick_millis > 0,
                error_message: "Tick length cannot be 0",
            },
            ValidationRule {
                field_path: "acquisition",
                validator: |config| {
                    let a = &config.acquisition;
                    [a.calibrating_secs, a.blowing_secs, a.analyzing_secs, a.processing_secs]
                        .iter()
                        .all(|secs| *secs > 0)
                },
                error_message: "Acquisition phases cannot be zero-length",
            },
        ];

        Self {
            validation_rules,
        }
    }

    /// 验证配置
    pub fn validate(&self, config: &ClientConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if !(rule.validator)(config) {
                error!("Configuration validation failed for {}", rule.field_path);
                return Err(anyhow::anyhow!("{}: {}", rule.field_path, rule.error_message));
            }
        }

        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            project_id: "breathdx-system".to_string(),
            api_key: String::new(),
            database: "(default)".to_string(),
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            request_timeout_secs: 30,
            page_size: 300,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            calibrating_secs: 6,
            blowing_secs: 10,
            analyzing_secs: 35,
            processing_secs: 5,
            tick_millis: 1000,
            results_settle_millis: 2000,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: "./exports".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_device_timing() {
        let config = ClientConfig::default();
        let settings = config.acquisition.workflow_settings();

        assert_eq!(settings.durations.total(), 56);
        assert_eq!(settings.tick, Duration::from_secs(1));
        assert_eq!(settings.results_settle, Duration::from_secs(2));
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_rest_config_conversion() {
        let mut config = ClientConfig::default();
        config.store.api_key = "k".to_string();
        let rest = config.store.to_rest_config();

        assert_eq!(rest.project_id, "breathdx-system");
        assert_eq!(rest.api_key, "k");
        assert_eq!(rest.request_timeout, Duration::from_secs(30));
        assert_eq!(rest.page_size, 300);
    }

    #[test]
    fn test_validator_rejects_bad_values() {
        let validator = ConfigValidator::new();

        let mut config = ClientConfig::default();
        config.store.project_id = " ".to_string();
        assert!(validator.validate(&config).is_err());

        let mut config = ClientConfig::default();
        config.acquisition.blowing_secs = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = ClientConfig::default();
        config.acquisition.tick_millis = 0;
        assert!(validator.validate(&config).is_err());
    }

    #[tokio::test]
    async fn test_partial_file_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("breathdx.toml");
        std::fs::write(
            &path,
            "[store]\nproject_id = \"clinic-a\"\napi_key = \"secret\"\n\n[acquisition]\nanalyzing_secs = 20\n",
        )
        .unwrap();

        let path_str = path.to_str().unwrap();
        let manager = ConfigManager::new(Some(path_str)).unwrap();
        let config = manager.get_config().await;

        assert_eq!(config.store.project_id, "clinic-a");
        assert_eq!(config.store.database, "(default)");
        assert_eq!(config.acquisition.analyzing_secs, 20);
        assert_eq!(config.acquisition.calibrating_secs, 6);

        let level: String = manager.get_value("logging.level").await.unwrap();
        assert_eq!(level, "info");
        assert!(manager.get_value::<String>("logging.missing").await.is_err());

        let mut updated = config.clone();
        updated.export.output_dir = "/tmp/out".to_string();
        manager.update_config(updated.clone()).await.unwrap();

        let reloaded = ConfigManager::new(Some(path_str)).unwrap();
        assert_eq!(reloaded.get_config().await, updated);
    }

    #[tokio::test]
    async fn test_set_value_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("breathdx.toml");
        let path_str = path.to_str().unwrap();

        let manager = ConfigManager::new(Some(path_str)).unwrap();
        manager.set_value("acquisition.tick_millis", "250").await.unwrap();
        manager.set_value("store.project_id", "clinic-b").await.unwrap();
        manager.set_value("store.api_key", "12345").await.unwrap();

        assert!(manager.set_value("acquisition.tick_millis", "fast").await.is_err());
        assert!(manager.set_value("acquisition.tick_millis", "0").await.is_err());
        assert!(manager.set_value("store.missing", "x").await.is_err());

        let reloaded = ConfigManager::new(Some(path_str)).unwrap().get_config().await;
        assert_eq!(reloaded.acquisition.tick_millis, 250);
        assert_eq!(reloaded.store.project_id, "clinic-b");
        assert_eq!(reloaded.store.api_key, "12345");
        assert!(std::fs::read_to_string(&path).unwrap().contains("tick_millis = 250"));
    }

    #[tokio::test]
    async fn test_set_value_requires_config_file() {
        let manager = ConfigManager::new(None).unwrap();
        assert!(manager.set_value("logging.level", "debug").await.is_err());
        assert!(manager.to_toml().await.unwrap().contains("[store]"));
    }

    #[tokio::test]
    async fn test_invalid_update_rejected() {
        let manager = ConfigManager::new(None).unwrap();
        let mut config = manager.get_config().await;
        config.store.page_size = 0;

        assert!(manager.update_config(config).await.is_err());
        assert_eq!(manager.get_config().await.store.page_size, 300);
    }
}
