//! In-process stand-ins for the integration traits, used by tests

use super::{
    ChatService, DeliveryStatus, Dictionary, IntegrationError, PushGateway, TaskState, TextStream,
    Translator, VideoGrants, VideoService,
};
use crate::models::PushSubscription;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeVideo {
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_delete: bool,
}

impl FakeVideo {
    pub fn failing_delete() -> Self {
        Self {
            fail_delete: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl VideoService for FakeVideo {
    fn url(&self) -> String {
        "wss://video.test".to_string()
    }

    async fn create_room(&self, name: &str) -> Result<(), IntegrationError> {
        self.created.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn delete_room(&self, name: &str) -> Result<(), IntegrationError> {
        if self.fail_delete {
            return Err(IntegrationError::Status {
                status: 500,
                body: "video server down".into(),
            });
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn create_token(
        &self,
        identity: &str,
        _display_name: &str,
        grants: VideoGrants,
    ) -> Result<String, IntegrationError> {
        Ok(format!(
            "token:{}:{}:{}",
            identity,
            grants.room.unwrap_or_default(),
            if grants.room_admin { "host" } else { "guest" }
        ))
    }
}

pub struct FakeChat {
    pending_polls: u32,
    fail: bool,
    polls: AtomicU32,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeChat {
    /// Task reports pending `pending_polls` times, then completed
    pub fn completing_after(pending_polls: u32) -> Self {
        Self {
            pending_polls,
            fail: false,
            polls: AtomicU32::new(0),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::completing_after(0)
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatService for FakeChat {
    fn user_token(&self, user_id: &str) -> Result<String, IntegrationError> {
        Ok(format!("chat:{}", user_id))
    }

    async fn delete_users(&self, user_ids: &[String]) -> Result<String, IntegrationError> {
        self.deleted.lock().unwrap().extend(user_ids.iter().cloned());
        Ok("task-1".to_string())
    }

    async fn task_status(&self, _task_id: &str) -> Result<TaskState, IntegrationError> {
        let seen = self.polls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Ok(TaskState::Failed("rejected".into()))
        } else if seen < self.pending_polls {
            Ok(TaskState::Pending)
        } else {
            Ok(TaskState::Completed)
        }
    }
}

/// Streams a fixed set of fragments
pub struct FakeTranslator {
    pub fragments: Vec<String>,
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, _text: &str, _target: &str) -> Result<TextStream, IntegrationError> {
        let items: Vec<Result<String, IntegrationError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        Ok(stream::iter(items).boxed())
    }
}

#[derive(Default)]
pub struct FakeDictionary {
    calls: AtomicU32,
}

impl FakeDictionary {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dictionary for FakeDictionary {
    async fn search(&self, query: &str) -> Result<String, IntegrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("<channel><item><word>{}</word></item></channel>", query))
    }
}

/// Push gateway that reports configured endpoints as gone or failing
#[derive(Default)]
pub struct FakePush {
    pub gone: HashSet<String>,
    pub failing: HashSet<String>,
    pub sent: Mutex<Vec<String>>,
}

impl FakePush {
    pub fn with_gone(endpoints: &[&str]) -> Self {
        Self {
            gone: endpoints.iter().map(|e| e.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_failing(endpoints: &[&str]) -> Self {
        Self {
            failing: endpoints.iter().map(|e| e.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl PushGateway for FakePush {
    async fn send(&self, subscription: &PushSubscription) -> Result<DeliveryStatus, IntegrationError> {
        if self.gone.contains(&subscription.endpoint) {
            return Ok(DeliveryStatus::Gone);
        }
        if self.failing.contains(&subscription.endpoint) {
            return Err(IntegrationError::Status {
                status: 500,
                body: "push service error".into(),
            });
        }
        self.sent.lock().unwrap().push(subscription.endpoint.clone());
        Ok(DeliveryStatus::Delivered)
    }
}
