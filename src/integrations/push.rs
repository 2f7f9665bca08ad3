//! Web Push delivery with VAPID authentication
//!
//! Messages are sent without a payload. The service worker wakes up on the
//! push event and fetches the newest entries from the notification inbox, so
//! no message encryption is needed here.

use super::{http_client, IntegrationError};
use crate::config::PushConfig;
use crate::models::PushSubscription;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

const VAPID_TOKEN_HOURS: i64 = 12;

/// Result of a single delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// The push service no longer knows this subscription
    Gone,
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, subscription: &PushSubscription) -> Result<DeliveryStatus, IntegrationError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct VapidClaims {
    aud: String,
    exp: i64,
    sub: String,
}

pub struct WebPushGateway {
    config: PushConfig,
    key: Option<EncodingKey>,
    client: reqwest::Client,
}

impl WebPushGateway {
    /// Parse the VAPID key up front; an unconfigured gateway refuses to send
    pub fn new(config: PushConfig) -> Result<Self, IntegrationError> {
        let key = if config.is_configured() {
            Some(EncodingKey::from_ec_pem(config.vapid_private_key_pem.as_bytes())?)
        } else {
            None
        };

        Ok(Self {
            config,
            key,
            client: http_client()?,
        })
    }

    fn vapid_header(&self, endpoint: &str) -> Result<String, IntegrationError> {
        let key = self
            .key
            .as_ref()
            .ok_or(IntegrationError::NotConfigured("Push service"))?;

        let claims = VapidClaims {
            aud: audience(endpoint)?,
            exp: (Utc::now() + Duration::hours(VAPID_TOKEN_HOURS)).timestamp(),
            sub: self.config.vapid_subject.clone(),
        };
        let token = encode(&Header::new(Algorithm::ES256), &claims, key)?;

        Ok(format!("vapid t={}, k={}", token, self.config.vapid_public_key))
    }
}

/// Origin of a push endpoint, used as the VAPID audience
fn audience(endpoint: &str) -> Result<String, IntegrationError> {
    let url = Url::parse(endpoint)
        .map_err(|e| IntegrationError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(IntegrationError::InvalidEndpoint(endpoint.to_string()));
    }
    Ok(url.origin().ascii_serialization())
}

#[async_trait]
impl PushGateway for WebPushGateway {
    async fn send(&self, subscription: &PushSubscription) -> Result<DeliveryStatus, IntegrationError> {
        let authorization = self.vapid_header(&subscription.endpoint)?;

        let response = self
            .client
            .post(&subscription.endpoint)
            .header("Authorization", authorization)
            .header("TTL", self.config.ttl_seconds.to_string())
            .header("Content-Length", "0")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(DeliveryStatus::Delivered)
        } else if status == StatusCode::GONE {
            Ok(DeliveryStatus::Gone)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(IntegrationError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            })
        }
    }
}
