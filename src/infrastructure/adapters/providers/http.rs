//! vendor HTTP 客户端的公共部分：配置、错误映射、流式上传

use chrono::{DateTime, Utc};
use reqwest::multipart::Part;
use reqwest::{Body, Client, Response, StatusCode, Url};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;

use crate::application::ports::ProviderError;

/// vendor 客户端配置
///
/// API key 由调用方显式注入，客户端不读取环境变量
#[derive(Clone)]
pub struct VendorClientConfig {
    /// API 基础 URL（不含 /v1）
    pub base_url: String,
    pub api_key: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl std::fmt::Debug for VendorClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl VendorClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout_secs: 120,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// 拼接 API 路径
    ///
    /// 每个片段单独做百分号编码，ID 中的 `/` 不会改变目标路径。
    /// 空片段与 `.`、`..` 直接拒绝。
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(ProviderError::NotFound(format!("Invalid resource id: {:?}", bad)));
        }

        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ProviderError::Encoding(format!("Invalid base URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::Encoding(format!("Base URL cannot carry a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn build_client(&self) -> Result<Client, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::Unauthorized("API key is empty".to_string()));
        }
        Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))
    }
}

/// 发送失败的错误映射
pub(crate) fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_connect() {
        ProviderError::NetworkError(format!("Cannot connect to batch API: {}", e))
    } else {
        ProviderError::NetworkError(e.to_string())
    }
}

/// 非 2xx 响应转换为错误
pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::Unauthorized(format!("HTTP {}: {}", status, error_text))
        }
        StatusCode::NOT_FOUND => ProviderError::NotFound(error_text),
        _ => ProviderError::ServiceError {
            status: status.as_u16(),
            message: error_text,
        },
    })
}

/// 解析 JSON 响应体
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, ProviderError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// 以流的方式打开批次文件，作为 multipart 的 file 字段
pub(crate) async fn file_part(path: &Path) -> Result<Part, ProviderError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ProviderError::Io(format!("{}: {}", path.display(), e)))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| ProviderError::Io(e.to_string()))?
        .len();

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "batch.jsonl".to_string());

    Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
        .file_name(file_name)
        .mime_str("application/jsonl")
        .map_err(|e| ProviderError::Encoding(e.to_string()))
}

pub(crate) fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|secs| DateTime::from_timestamp(secs, 0))
}
