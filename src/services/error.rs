//! Error type shared by the domain services

use crate::integrations::IntegrationError;

/// Errors returned by course, vocabulary, live, tryout, push and admin services
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Caller is authenticated but not allowed to act on the resource
    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// An integration is not configured
    #[error("{0} is not configured")]
    Unavailable(&'static str),

    /// An upstream service failed
    #[error("Upstream error: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }
}

impl From<IntegrationError> for ServiceError {
    fn from(err: IntegrationError) -> Self {
        match err {
            IntegrationError::NotConfigured(name) => ServiceError::Unavailable(name),
            other => ServiceError::BadGateway(other.to_string()),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
