//! 批处理任务行格式
//!
//! OpenAI: {"custom_id", "method", "url", "body"}
//! Mistral: {"custom_id", "body"}
//! 两者的 body 都是 chat completion 请求体

use serde::{Deserialize, Serialize};

use crate::application::ports::ProviderError;
use crate::domain::{ChatMessage, GenerationParameters, Task, TaskId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

/// chat completion 请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChatBody {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    pub messages: Vec<ChatMessage>,
}

impl ChatBody {
    fn from_task(task: &Task) -> Self {
        let params = task.parameters();
        Self {
            model: task.model_name().to_string(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            response_format: params.json_response.then(|| ResponseFormat {
                kind: "json_object".to_string(),
            }),
            messages: task.messages().to_vec(),
        }
    }

    fn into_task(self, custom_id: String) -> Result<Task, ProviderError> {
        let id = TaskId::new(custom_id).map_err(|e| ProviderError::Encoding(e.to_string()))?;
        let parameters = GenerationParameters {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            json_response: self
                .response_format
                .is_some_and(|format| format.kind == "json_object"),
        };
        Ok(Task::new(id, self.model, self.messages, parameters))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiTaskLine {
    custom_id: String,
    method: String,
    url: String,
    body: ChatBody,
}

#[derive(Debug, Serialize, Deserialize)]
struct MistralTaskLine {
    custom_id: String,
    body: ChatBody,
}

fn to_value<T: Serialize>(line: &T) -> Result<serde_json::Value, ProviderError> {
    serde_json::to_value(line).map_err(|e| ProviderError::Encoding(e.to_string()))
}

pub(crate) fn encode_openai_task(
    task: &Task,
    endpoint: &str,
) -> Result<serde_json::Value, ProviderError> {
    to_value(&OpenAiTaskLine {
        custom_id: task.id().to_string(),
        method: "POST".to_string(),
        url: endpoint.to_string(),
        body: ChatBody::from_task(task),
    })
}

pub(crate) fn decode_openai_task(line: serde_json::Value) -> Result<Task, ProviderError> {
    let line: OpenAiTaskLine =
        serde_json::from_value(line).map_err(|e| ProviderError::Encoding(e.to_string()))?;
    line.body.into_task(line.custom_id)
}

pub(crate) fn encode_mistral_task(task: &Task) -> Result<serde_json::Value, ProviderError> {
    to_value(&MistralTaskLine {
        custom_id: task.id().to_string(),
        body: ChatBody::from_task(task),
    })
}

pub(crate) fn decode_mistral_task(line: serde_json::Value) -> Result<Task, ProviderError> {
    let line: MistralTaskLine =
        serde_json::from_value(line).map_err(|e| ProviderError::Encoding(e.to_string()))?;
    line.body.into_task(line.custom_id)
}
