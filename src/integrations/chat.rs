//! Chat SaaS (Stream Chat) client
//!
//! Used for chat user tokens and for hard-deleting users. Bulk deletion is
//! asynchronous on the provider side: it returns a task id that is polled
//! until it completes.

use super::{check_status, http_client, IntegrationError};
use crate::config::ChatConfig;
use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// State of an asynchronous provider task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Completed,
    Failed(String),
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Client token for a chat user
    fn user_token(&self, user_id: &str) -> Result<String, IntegrationError>;

    /// Start a hard delete of users, their messages and conversations
    async fn delete_users(&self, user_ids: &[String]) -> Result<String, IntegrationError>;

    async fn task_status(&self, task_id: &str) -> Result<TaskState, IntegrationError>;
}

/// Poll a task every `interval` until it completes, fails, or `max_attempts` polls pass
pub async fn wait_for_task(
    service: &dyn ChatService,
    task_id: &str,
    interval: Duration,
    max_attempts: u32,
) -> Result<(), IntegrationError> {
    for attempt in 1..=max_attempts {
        match service.task_status(task_id).await? {
            TaskState::Completed => {
                tracing::debug!(task_id, attempt, "Chat task completed");
                return Ok(());
            }
            TaskState::Failed(reason) => {
                return Err(IntegrationError::TaskFailed {
                    task_id: task_id.to_string(),
                    reason,
                });
            }
            TaskState::Pending => {
                if attempt < max_attempts {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    Err(IntegrationError::Timeout {
        task_id: task_id.to_string(),
        attempts: max_attempts,
    })
}

#[derive(Debug, Deserialize)]
struct DeleteUsersResponse {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    status: String,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

pub struct StreamChatService {
    config: ChatConfig,
    client: reqwest::Client,
}

impl StreamChatService {
    pub fn new(config: ChatConfig) -> Result<Self, IntegrationError> {
        Ok(Self {
            config,
            client: http_client()?,
        })
    }

    fn ensure_configured(&self) -> Result<(), IntegrationError> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(IntegrationError::NotConfigured("Chat service"))
        }
    }

    fn sign(&self, claims: &serde_json::Value) -> Result<String, IntegrationError> {
        Ok(encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.config.api_secret.as_bytes()),
        )?)
    }

    fn server_token(&self) -> Result<String, IntegrationError> {
        self.sign(&json!({ "server": true }))
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}?api_key={}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/'),
            self.config.api_key
        )
    }
}

#[async_trait]
impl ChatService for StreamChatService {
    fn user_token(&self, user_id: &str) -> Result<String, IntegrationError> {
        self.ensure_configured()?;
        self.sign(&json!({ "user_id": user_id }))
    }

    async fn delete_users(&self, user_ids: &[String]) -> Result<String, IntegrationError> {
        self.ensure_configured()?;

        let response = self
            .client
            .post(self.endpoint("users/delete"))
            .header("Authorization", self.server_token()?)
            .header("stream-auth-type", "jwt")
            .json(&json!({
                "user_ids": user_ids,
                "user": "hard",
                "messages": "hard",
                "conversations": "hard",
            }))
            .send()
            .await?;

        let body: DeleteUsersResponse = check_status(response).await?.json().await?;
        Ok(body.task_id)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskState, IntegrationError> {
        self.ensure_configured()?;

        let response = self
            .client
            .get(self.endpoint(&format!("tasks/{}", task_id)))
            .header("Authorization", self.server_token()?)
            .header("stream-auth-type", "jwt")
            .send()
            .await?;

        let body: TaskResponse = check_status(response).await?.json().await?;
        Ok(parse_task_state(&body))
    }
}

fn parse_task_state(body: &TaskResponse) -> TaskState {
    match body.status.as_str() {
        "completed" => TaskState::Completed,
        "failed" => TaskState::Failed(
            body.result
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        ),
        _ => TaskState::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::fakes::FakeChat;

    #[test]
    fn test_parse_task_state() {
        let pending = TaskResponse { status: "running".into(), result: None };
        assert_eq!(parse_task_state(&pending), TaskState::Pending);

        let done = TaskResponse { status: "completed".into(), result: None };
        assert_eq!(parse_task_state(&done), TaskState::Completed);

        let failed = TaskResponse {
            status: "failed".into(),
            result: Some(json!({"error": "boom"})),
        };
        assert!(matches!(parse_task_state(&failed), TaskState::Failed(r) if r.contains("boom")));
    }

    #[test]
    fn test_endpoint_carries_api_key() {
        let service = StreamChatService::new(ChatConfig {
            api_key: "key".into(),
            api_secret: "secret".into(),
            ..ChatConfig::default()
        })
        .unwrap();
        assert_eq!(
            service.endpoint("/tasks/abc"),
            "https://chat.stream-io-api.com/tasks/abc?api_key=key"
        );
    }

    #[tokio::test]
    async fn test_wait_for_task_completes_after_polls() {
        let chat = FakeChat::completing_after(2);
        wait_for_task(&chat, "task-1", Duration::from_millis(1), 5)
            .await
            .unwrap();
        assert_eq!(chat.polls(), 3);
    }

    #[tokio::test]
    async fn test_wait_for_task_times_out() {
        let chat = FakeChat::completing_after(10);
        let result = wait_for_task(&chat, "task-1", Duration::from_millis(1), 3).await;
        assert!(matches!(result, Err(IntegrationError::Timeout { attempts: 3, .. })));
        assert_eq!(chat.polls(), 3);
    }

    #[tokio::test]
    async fn test_wait_for_task_failure() {
        let chat = FakeChat::failing();
        let result = wait_for_task(&chat, "task-1", Duration::from_millis(1), 3).await;
        assert!(matches!(result, Err(IntegrationError::TaskFailed { .. })));
    }

    #[test]
    fn test_unconfigured_user_token() {
        let service = StreamChatService::new(ChatConfig::default()).unwrap();
        assert!(matches!(
            service.user_token("1"),
            Err(IntegrationError::NotConfigured(_))
        ));
    }
}
