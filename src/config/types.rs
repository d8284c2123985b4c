//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::poller::PollOptions;
use crate::application::ports::ProviderKind;
use crate::application::processor::{
    ProcessorSettings, DEFAULT_COMPLETION_WINDOW, DEFAULT_ENDPOINT,
};
use crate::domain::GenerationParameters;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// vendor 配置
    #[serde(default)]
    pub provider: ProviderConfig,

    /// 任务生成配置
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// 本地文件配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 轮询配置
    #[serde(default)]
    pub poll: PollConfig,

    /// 批次循环配置
    #[serde(default)]
    pub run: RunConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// vendor 配置
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    /// openai | mistral | fake
    #[serde(default)]
    pub kind: ProviderKind,

    /// API key；未设置时由加载器从 vendor 环境变量读取
    #[serde(default)]
    pub api_key: Option<String>,

    /// API 基础 URL 覆盖
    #[serde(default)]
    pub base_url: Option<String>,

    /// 请求超时时间（秒）
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_key: None,
            base_url: None,
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    /// 实际使用的基础 URL
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.kind.default_base_url().to_string())
    }

    /// 是否已配置非空 API key
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// 任务生成配置
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    /// 模型名称（必填）
    #[serde(default)]
    pub model_name: String,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,

    /// 要求 JSON 对象格式的响应
    #[serde(default)]
    pub json_response: bool,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// 完成窗口（仅 OpenAI）
    #[serde(default = "default_completion_window")]
    pub completion_window: String,
}

fn default_temperature() -> Option<f32> {
    Some(0.1)
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_completion_window() -> String {
    DEFAULT_COMPLETION_WINDOW.to_string()
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            max_tokens: None,
            temperature: default_temperature(),
            json_response: false,
            endpoint: default_endpoint(),
            completion_window: default_completion_window(),
        }
    }
}

impl ProcessorConfig {
    pub fn settings(&self) -> ProcessorSettings {
        let mut settings =
            ProcessorSettings::new(self.model_name.clone()).with_parameters(GenerationParameters {
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                json_response: self.json_response,
            });
        settings.endpoint = self.endpoint.clone();
        settings.completion_window = self.completion_window.clone();
        settings
    }
}

/// 本地文件配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 所有文件名的前缀
    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,

    /// 任务文件目录
    #[serde(default = "default_task_dir")]
    pub task_dir: PathBuf,

    /// 批次文件目录
    #[serde(default = "default_batch_dir")]
    pub batch_dir: PathBuf,

    /// 输出文件目录
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_filename_prefix() -> String {
    "my_file".to_string()
}

fn default_task_dir() -> PathBuf {
    PathBuf::from("batch_tasks")
}

fn default_batch_dir() -> PathBuf {
    PathBuf::from("batch_jobs")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("batch_outputs")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            filename_prefix: default_filename_prefix(),
            task_dir: default_task_dir(),
            batch_dir: default_batch_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// 轮询配置
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// 查询间隔（分钟）
    #[serde(default = "default_check_interval")]
    pub check_interval_mins: u64,

    /// 最长等待时间（分钟），0 表示不设上限
    #[serde(default = "default_poll_timeout")]
    pub timeout_mins: u64,

    /// 允许连续查询失败的次数
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
}

fn default_check_interval() -> u64 {
    3
}

fn default_poll_timeout() -> u64 {
    24 * 60
}

fn default_max_consecutive_errors() -> u32 {
    5
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            check_interval_mins: default_check_interval(),
            timeout_mins: default_poll_timeout(),
            max_consecutive_errors: default_max_consecutive_errors(),
        }
    }
}

impl PollConfig {
    /// 转换为轮询参数（取消令牌由调用方注入）
    pub fn options(&self) -> PollOptions {
        let timeout = (self.timeout_mins > 0).then(|| minutes(self.timeout_mins));
        PollOptions::every(minutes(self.check_interval_mins))
            .with_timeout(timeout)
            .with_max_consecutive_errors(self.max_consecutive_errors)
    }
}

fn minutes(mins: u64) -> Duration {
    Duration::from_secs(mins.saturating_mul(60))
}

/// 批次循环配置
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// 每批任务数
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    20_000
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
