//! Third-party service clients
//!
//! Every integration sits behind a trait so services can be tested with the
//! in-process fakes in [`fakes`]. HTTP implementations share one `reqwest`
//! client configuration.

pub mod chat;
pub mod dictionary;
pub mod push;
pub mod translation;
pub mod video;

#[cfg(test)]
pub(crate) mod fakes;

use std::time::Duration;

pub use chat::{wait_for_task, ChatService, StreamChatService, TaskState};
pub use dictionary::{Dictionary, KrDictClient};
pub use push::{DeliveryStatus, PushGateway, WebPushGateway};
pub use translation::{OpenAiTranslator, TextStream, Translator};
pub use video::{LiveKitService, VideoGrants, VideoService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by the integration clients
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Task {task_id} failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    #[error("Task {task_id} did not finish after {attempts} polls")]
    Timeout { task_id: String, attempts: u32 },
}

/// Build the HTTP client used by the integrations
pub fn http_client() -> Result<reqwest::Client, IntegrationError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Turn a non-success response into `IntegrationError::Status`
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(IntegrationError::Status {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}
