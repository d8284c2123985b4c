//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（batchrun.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::application::ports::ProviderKind;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 轮询间隔与截止时间的上限（分钟，一年）
pub const MAX_POLL_MINUTES: u64 = 365 * 24 * 60;

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["batchrun", "batchrun.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `BATCHRUN_`，层级分隔符 `__`）
/// 2. 配置文件（batchrun.toml 或 batchrun.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `BATCHRUN_PROVIDER__KIND=mistral`
/// - `BATCHRUN_PROCESSOR__MODEL_NAME=gpt-4o-mini`
/// - `BATCHRUN_POLL__CHECK_INTERVAL_MINS=1`
///
/// `provider.api_key` 未设置时读取 vendor 自己的环境变量
/// （`OPENAI_API_KEY` / `MISTRAL_API_KEY`）。
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut app_config = build_config(config_path)?;
    resolve_api_key(&mut app_config, |name| std::env::var(name).ok());
    validate_config(&app_config)?;
    Ok(app_config)
}

fn build_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("provider.kind", "openai")?
        .set_default("provider.timeout_secs", 120)?
        .set_default("processor.temperature", 0.1)?
        .set_default("processor.json_response", false)?
        .set_default("processor.endpoint", "/v1/chat/completions")?
        .set_default("processor.completion_window", "24h")?
        .set_default("storage.filename_prefix", "my_file")?
        .set_default("storage.task_dir", "batch_tasks")?
        .set_default("storage.batch_dir", "batch_jobs")?
        .set_default("storage.output_dir", "batch_outputs")?
        .set_default("poll.check_interval_mins", 3)?
        .set_default("poll.timeout_mins", 24 * 60)?
        .set_default("poll.max_consecutive_errors", 5)?
        .set_default("run.batch_size", 20_000)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: BATCHRUN_PROCESSOR__MODEL_NAME=gpt-4o-mini
    builder = builder.add_source(
        Environment::with_prefix("BATCHRUN")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })
}

/// 未显式配置 API key 时，从 vendor 环境变量读取一次
fn resolve_api_key(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if config.provider.has_api_key() {
        return;
    }
    if let Some(name) = config.provider.kind.api_key_env() {
        config.provider.api_key = lookup(name).filter(|key| !key.trim().is_empty());
    }
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.processor.model_name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "processor.model_name cannot be empty".to_string(),
        ));
    }

    if config.run.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "run.batch_size must be greater than 0".to_string(),
        ));
    }

    for (name, mins) in [
        ("poll.check_interval_mins", config.poll.check_interval_mins),
        ("poll.timeout_mins", config.poll.timeout_mins),
    ] {
        if mins > MAX_POLL_MINUTES {
            return Err(ConfigError::ValidationError(format!(
                "{} must be at most {} (got {})",
                name, MAX_POLL_MINUTES, mins
            )));
        }
    }

    if config.provider.kind != ProviderKind::Fake && !config.provider.has_api_key() {
        return Err(ConfigError::ValidationError(format!(
            "No API key for {}: set provider.api_key or {}",
            config.provider.kind,
            config.provider.kind.api_key_env().unwrap_or("BATCHRUN_PROVIDER__API_KEY")
        )));
    }

    let storage = &config.storage;
    for (name, dir) in [
        ("storage.task_dir", &storage.task_dir),
        ("storage.batch_dir", &storage.batch_dir),
        ("storage.output_dir", &storage.output_dir),
    ] {
        if dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                name
            )));
        }
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Batch Configuration ===");
    tracing::info!("Provider: {}", config.provider.kind);
    tracing::info!("Base URL: {}", config.provider.resolved_base_url());
    tracing::info!(
        "API Key: {}",
        if config.provider.has_api_key() { "<set>" } else { "<unset>" }
    );
    tracing::info!("Model: {}", config.processor.model_name);
    tracing::info!("Endpoint: {}", config.processor.endpoint);
    tracing::info!("File Prefix: {}", config.storage.filename_prefix);
    tracing::info!("Task Directory: {:?}", config.storage.task_dir);
    tracing::info!("Batch Directory: {:?}", config.storage.batch_dir);
    tracing::info!("Output Directory: {:?}", config.storage.output_dir);
    tracing::info!("Check Interval: {}min", config.poll.check_interval_mins);
    if config.poll.timeout_mins > 0 {
        tracing::info!("Poll Timeout: {}min", config.poll.timeout_mins);
    } else {
        tracing::info!("Poll Timeout: none");
    }
    tracing::info!("Batch Size: {}", config.run.batch_size);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("===========================");
}
