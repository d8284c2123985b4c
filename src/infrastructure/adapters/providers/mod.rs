//! Batch Provider Adapters - vendor 批处理 API 客户端
//!
//! - openai: OpenAI Batch API
//! - mistral: Mistral Batch API
//! - fake: 内存实现，用于测试和演练

mod fake_provider;
mod http;
mod mistral_client;
mod openai_client;
mod wire;

use std::sync::Arc;

use crate::application::ports::{BatchProviderPort, ProviderError, ProviderKind};

pub use fake_provider::FakeBatchProvider;
pub use http::VendorClientConfig;
pub use mistral_client::MistralBatchClient;
pub use openai_client::OpenAiBatchClient;

/// 根据 vendor 种类创建客户端
pub fn build_provider(
    kind: ProviderKind,
    config: VendorClientConfig,
) -> Result<Arc<dyn BatchProviderPort>, ProviderError> {
    tracing::debug!(provider = %kind, base_url = %config.base_url, "Building batch provider");

    let provider: Arc<dyn BatchProviderPort> = match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiBatchClient::new(config)?),
        ProviderKind::Mistral => Arc::new(MistralBatchClient::new(config)?),
        ProviderKind::Fake => Arc::new(FakeBatchProvider::new()),
    };
    Ok(provider)
}
