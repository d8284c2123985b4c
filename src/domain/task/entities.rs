//! Task Context - Entities

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{TaskError, TaskId};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// 对话消息（role/content 对）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// 生成参数
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// 最大输出 token 数
    pub max_tokens: Option<u32>,
    /// 采样温度
    pub temperature: Option<f32>,
    /// 是否要求 JSON 对象格式输出
    pub json_response: bool,
}

/// 推理任务 - 一个任务对应一次推理请求
///
/// 不变量:
/// - id 在同一次构建调用中唯一
/// - 创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    model_name: String,
    messages: Vec<ChatMessage>,
    parameters: GenerationParameters,
}

impl Task {
    pub fn new(
        id: TaskId,
        model_name: impl Into<String>,
        messages: Vec<ChatMessage>,
        parameters: GenerationParameters,
    ) -> Self {
        Self {
            id,
            model_name: model_name.into(),
            messages,
            parameters,
        }
    }

    // Getters
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn parameters(&self) -> &GenerationParameters {
        &self.parameters
    }
}

/// 由并列的 id 列表与消息组列表构建任务，保持输入顺序
///
/// 两个列表长度必须一致，id 不可为空且不可重复。
pub fn build_tasks(
    ids: Vec<String>,
    message_sets: Vec<Vec<ChatMessage>>,
    model_name: &str,
    parameters: &GenerationParameters,
) -> Result<Vec<Task>, TaskError> {
    if ids.len() != message_sets.len() {
        return Err(TaskError::LengthMismatch {
            ids: ids.len(),
            messages: message_sets.len(),
        });
    }

    let mut seen = HashSet::with_capacity(ids.len());
    let mut tasks = Vec::with_capacity(ids.len());

    for (id, messages) in ids.into_iter().zip(message_sets) {
        let id = TaskId::new(id)?;
        if !seen.insert(id.clone()) {
            return Err(TaskError::DuplicateId(id.to_string()));
        }
        tasks.push(Task::new(id, model_name, messages, parameters.clone()));
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sets(n: usize) -> Vec<Vec<ChatMessage>> {
        (0..n)
            .map(|i| vec![ChatMessage::user(format!("question {}", i))])
            .collect()
    }

    #[test]
    fn test_build_tasks_preserves_order_and_count() {
        let ids: Vec<String> = (0..5).map(|i| format!("t{}", i)).collect();
        let params = GenerationParameters {
            max_tokens: Some(256),
            ..Default::default()
        };

        let tasks = build_tasks(ids.clone(), sets(5), "gpt-4o-mini", &params).unwrap();

        assert_eq!(tasks.len(), ids.len());
        for (task, id) in tasks.iter().zip(&ids) {
            assert_eq!(task.id().as_str(), id);
            assert_eq!(task.model_name(), "gpt-4o-mini");
            assert_eq!(task.parameters().max_tokens, Some(256));
        }
        assert_eq!(tasks[3].messages()[0].content, "question 3");
    }

    #[test]
    fn test_build_tasks_rejects_length_mismatch() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let err = build_tasks(ids, sets(3), "m", &GenerationParameters::default()).unwrap_err();
        assert_eq!(err, TaskError::LengthMismatch { ids: 2, messages: 3 });
    }

    #[test]
    fn test_build_tasks_rejects_duplicate_ids() {
        let ids = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let err = build_tasks(ids, sets(3), "m", &GenerationParameters::default()).unwrap_err();
        assert_eq!(err, TaskError::DuplicateId("a".to_string()));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::system("be brief")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"be brief"}"#);
    }
}
