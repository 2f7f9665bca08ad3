//! Video conferencing (LiveKit)
//!
//! Access tokens are HS256 JWTs signed with the API secret. Rooms are managed
//! through the Twirp `RoomService` over plain HTTP.

use super::{check_status, http_client, IntegrationError};
use crate::config::VideoConfig;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Lifetime of a join token
const TOKEN_TTL_HOURS: i64 = 6;

/// Empty rooms are closed by the server after this many seconds
const EMPTY_TIMEOUT_SECONDS: u32 = 600;

/// Permissions embedded in a join token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrants {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default)]
    pub room_join: bool,
    #[serde(default)]
    pub room_create: bool,
    #[serde(default)]
    pub room_admin: bool,
    #[serde(default)]
    pub can_publish: bool,
    #[serde(default)]
    pub can_subscribe: bool,
}

impl VideoGrants {
    /// Host grants: join, publish, subscribe and moderate
    pub fn host(room: &str) -> Self {
        Self {
            room: Some(room.to_string()),
            room_join: true,
            room_admin: true,
            can_publish: true,
            can_subscribe: true,
            ..Self::default()
        }
    }

    /// Participant grants: join, publish and subscribe
    pub fn participant(room: &str) -> Self {
        Self {
            room: Some(room.to_string()),
            room_join: true,
            can_publish: true,
            can_subscribe: true,
            ..Self::default()
        }
    }

    fn room_management() -> Self {
        Self {
            room_create: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    iss: String,
    sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    nbf: i64,
    exp: i64,
    video: VideoGrants,
}

#[async_trait]
pub trait VideoService: Send + Sync {
    /// Public URL clients connect to
    fn url(&self) -> String;

    async fn create_room(&self, name: &str) -> Result<(), IntegrationError>;

    async fn delete_room(&self, name: &str) -> Result<(), IntegrationError>;

    fn create_token(
        &self,
        identity: &str,
        display_name: &str,
        grants: VideoGrants,
    ) -> Result<String, IntegrationError>;
}

/// LiveKit server client
pub struct LiveKitService {
    config: VideoConfig,
    client: reqwest::Client,
}

impl LiveKitService {
    pub fn new(config: VideoConfig) -> Result<Self, IntegrationError> {
        Ok(Self {
            config,
            client: http_client()?,
        })
    }

    /// HTTP(S) base for the Twirp API, derived from the websocket URL
    fn api_base(&self) -> String {
        let url = self.config.url.trim_end_matches('/');
        if let Some(rest) = url.strip_prefix("wss://") {
            format!("https://{}", rest)
        } else if let Some(rest) = url.strip_prefix("ws://") {
            format!("http://{}", rest)
        } else {
            url.to_string()
        }
    }

    fn sign(&self, identity: &str, name: Option<&str>, grants: VideoGrants) -> Result<String, IntegrationError> {
        if !self.config.is_configured() {
            return Err(IntegrationError::NotConfigured("Video service"));
        }

        let now = Utc::now();
        let claims = AccessClaims {
            iss: self.config.api_key.clone(),
            sub: identity.to_string(),
            name: name.map(str::to_string),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
            video: grants,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.api_secret.as_bytes()),
        )?)
    }

    async fn twirp(&self, method: &str, body: serde_json::Value) -> Result<(), IntegrationError> {
        let token = self.sign("hakgyo-server", None, VideoGrants::room_management())?;
        let url = format!("{}/twirp/livekit.RoomService/{}", self.api_base(), method);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl VideoService for LiveKitService {
    fn url(&self) -> String {
        self.config.url.clone()
    }

    async fn create_room(&self, name: &str) -> Result<(), IntegrationError> {
        self.twirp(
            "CreateRoom",
            json!({ "name": name, "empty_timeout": EMPTY_TIMEOUT_SECONDS }),
        )
        .await
    }

    async fn delete_room(&self, name: &str) -> Result<(), IntegrationError> {
        self.twirp("DeleteRoom", json!({ "room": name })).await
    }

    fn create_token(
        &self,
        identity: &str,
        display_name: &str,
        grants: VideoGrants,
    ) -> Result<String, IntegrationError> {
        self.sign(identity, Some(display_name), grants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn config() -> VideoConfig {
        VideoConfig {
            url: "wss://video.hakgyo.test".to_string(),
            api_key: "APIkey".to_string(),
            api_secret: "secret-secret-secret-secret".to_string(),
        }
    }

    #[test]
    fn test_token_claims() {
        let service = LiveKitService::new(config()).unwrap();
        let token = service
            .create_token("user-7", "Siti", VideoGrants::participant("live-1"))
            .unwrap();

        let data = decode::<AccessClaims>(
            &token,
            &DecodingKey::from_secret(b"secret-secret-secret-secret"),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(data.claims.iss, "APIkey");
        assert_eq!(data.claims.sub, "user-7");
        assert_eq!(data.claims.name.as_deref(), Some("Siti"));
        assert_eq!(data.claims.video.room.as_deref(), Some("live-1"));
        assert!(data.claims.video.room_join);
        assert!(!data.claims.video.room_admin);
    }

    #[test]
    fn test_grants_serialize_camel_case() {
        let value = serde_json::to_value(VideoGrants::host("r")).unwrap();
        assert_eq!(value["roomJoin"], true);
        assert_eq!(value["roomAdmin"], true);
        assert_eq!(value["canPublish"], true);
    }

    #[test]
    fn test_unconfigured_service_refuses_tokens() {
        let service = LiveKitService::new(VideoConfig::default()).unwrap();
        let result = service.create_token("u", "n", VideoGrants::participant("r"));
        assert!(matches!(result, Err(IntegrationError::NotConfigured(_))));
    }

    #[test]
    fn test_api_base_from_websocket_url() {
        let service = LiveKitService::new(config()).unwrap();
        assert_eq!(service.api_base(), "https://video.hakgyo.test");
    }
}
