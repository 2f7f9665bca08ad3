//! Configuration management
//!
//! Configuration is read from `config.yml` and can be overridden through
//! `HAKGYO_*` environment variables. Missing values fall back to defaults,
//! and an integration whose credentials are left empty is treated as
//! not configured.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub mobile: MobileConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub streak: StreakConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    #[serde(default)]
    pub push: PushConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path or `sqlite:` URL
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/hakgyo.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// Web session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_days")]
    pub expiration_days: i64,
    /// Mark the session cookie `Secure`
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_session_days(),
            secure_cookie: false,
        }
    }
}

fn default_session_days() -> i64 {
    7
}

/// Mobile API (JWT) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileConfig {
    /// HS256 signing secret shared by every API instance
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_days")]
    pub token_expiry_days: i64,
}

impl Default for MobileConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_days: default_token_days(),
        }
    }
}

fn default_token_days() -> i64 {
    30
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    #[serde(default = "default_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_capacity() -> u64 {
    10_000
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// URL prefix the upload directory is served under
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    #[serde(default = "default_max_image_size")]
    pub max_image_size: u64,
    #[serde(default = "default_max_audio_size")]
    pub max_audio_size: u64,
    #[serde(default = "default_image_types")]
    pub image_types: Vec<String>,
    #[serde(default = "default_audio_types")]
    pub audio_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            public_prefix: default_public_prefix(),
            max_image_size: default_max_image_size(),
            max_audio_size: default_max_audio_size(),
            image_types: default_image_types(),
            audio_types: default_audio_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_prefix() -> String {
    "/uploads".to_string()
}

fn default_max_image_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_max_audio_size() -> u64 {
    20 * 1024 * 1024 // 20MB
}

fn default_image_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/gif", "image/webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_audio_types() -> Vec<String> {
    ["audio/mpeg", "audio/wav", "audio/ogg", "audio/webm", "audio/mp4"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Upload kind, each with its own limits and sub-directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Audio,
}

impl UploadKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            UploadKind::Image => "images",
            UploadKind::Audio => "audio",
        }
    }
}

impl UploadConfig {
    /// Check if a MIME type is allowed for the given kind
    pub fn is_type_allowed(&self, kind: UploadKind, mime_type: &str) -> bool {
        let allowed = match kind {
            UploadKind::Image => &self.image_types,
            UploadKind::Audio => &self.audio_types,
        };
        allowed.iter().any(|t| t == mime_type)
    }

    pub fn max_size(&self, kind: UploadKind) -> u64 {
        match kind {
            UploadKind::Image => self.max_image_size,
            UploadKind::Audio => self.max_audio_size,
        }
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "audio/mpeg" => "mp3",
            "audio/wav" => "wav",
            "audio/ogg" => "ogg",
            "audio/webm" => "webm",
            "audio/mp4" => "m4a",
            _ => "bin",
        }
    }
}

/// Streak configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakConfig {
    /// Offset from UTC used to decide what "today" is (WIB by default)
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset(),
        }
    }
}

fn default_utc_offset() -> i32 {
    7
}

/// Video room service (LiveKit-compatible)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Server URL, e.g. `https://video.example.com`
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

impl VideoConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

/// Chat SaaS (Stream-compatible), used for chat tokens and user cleanup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Interval between task status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Maximum number of status polls before giving up
    #[serde(default = "default_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_url(),
            api_key: String::new(),
            api_secret: String::new(),
            poll_interval_ms: default_poll_interval(),
            max_poll_attempts: default_poll_attempts(),
        }
    }
}

impl ChatConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

fn default_chat_url() -> String {
    "https://chat.stream-io-api.com".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_poll_attempts() -> u32 {
    30
}

/// Translation AI (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_translation_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_translation_model")]
    pub model: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: default_translation_url(),
            api_key: String::new(),
            model: default_translation_model(),
        }
    }
}

impl TranslationConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

fn default_translation_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_translation_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Korean dictionary open API (KRDict)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryConfig {
    #[serde(default = "default_dictionary_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Translation language code passed upstream (Indonesian = 11)
    #[serde(default = "default_trans_lang")]
    pub trans_lang: u32,
    #[serde(default = "default_dictionary_ttl")]
    pub cache_ttl_seconds: u64,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            base_url: default_dictionary_url(),
            api_key: String::new(),
            trans_lang: default_trans_lang(),
            cache_ttl_seconds: default_dictionary_ttl(),
        }
    }
}

impl DictionaryConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

fn default_dictionary_url() -> String {
    "https://krdict.korean.go.kr/api/search".to_string()
}

fn default_trans_lang() -> u32 {
    11
}

fn default_dictionary_ttl() -> u64 {
    86400
}

/// Web Push (VAPID) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Contact URI put in the VAPID `sub` claim
    #[serde(default = "default_vapid_subject")]
    pub vapid_subject: String,
    /// Uncompressed P-256 public key, base64url
    #[serde(default)]
    pub vapid_public_key: String,
    /// PKCS#8 PEM private key matching `vapid_public_key`
    #[serde(default)]
    pub vapid_private_key_pem: String,
    /// Seconds the push service should keep an undelivered message
    #[serde(default = "default_push_ttl")]
    pub ttl_seconds: u32,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            vapid_subject: default_vapid_subject(),
            vapid_public_key: String::new(),
            vapid_private_key_pem: String::new(),
            ttl_seconds: default_push_ttl(),
        }
    }
}

impl PushConfig {
    pub fn is_configured(&self) -> bool {
        !self.vapid_public_key.is_empty() && !self.vapid_private_key_pem.is_empty()
    }
}

fn default_vapid_subject() -> String {
    "mailto:admin@localhost".to_string()
}

fn default_push_ttl() -> u32 {
    86400
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration; invalid
    /// YAML is reported with its location.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Variables follow `HAKGYO_<SECTION>_<KEY>`, e.g. `HAKGYO_SERVER_PORT`,
    /// `HAKGYO_DATABASE_URL`, `HAKGYO_MOBILE_JWT_SECRET`.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        override_string("HAKGYO_SERVER_HOST", &mut self.server.host);
        override_parsed("HAKGYO_SERVER_PORT", &mut self.server.port);
        override_string("HAKGYO_SERVER_CORS_ORIGIN", &mut self.server.cors_origin);

        override_string("HAKGYO_DATABASE_URL", &mut self.database.url);
        override_parsed(
            "HAKGYO_DATABASE_MAX_CONNECTIONS",
            &mut self.database.max_connections,
        );

        override_parsed(
            "HAKGYO_SESSION_EXPIRATION_DAYS",
            &mut self.session.expiration_days,
        );
        override_parsed(
            "HAKGYO_SESSION_SECURE_COOKIE",
            &mut self.session.secure_cookie,
        );

        override_string("HAKGYO_MOBILE_JWT_SECRET", &mut self.mobile.jwt_secret);
        override_parsed(
            "HAKGYO_MOBILE_TOKEN_EXPIRY_DAYS",
            &mut self.mobile.token_expiry_days,
        );

        override_parsed("HAKGYO_CACHE_TTL_SECONDS", &mut self.cache.ttl_seconds);

        if let Ok(path) = std::env::var("HAKGYO_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        override_parsed(
            "HAKGYO_STREAK_UTC_OFFSET_HOURS",
            &mut self.streak.utc_offset_hours,
        );

        override_string("HAKGYO_VIDEO_URL", &mut self.video.url);
        override_string("HAKGYO_VIDEO_API_KEY", &mut self.video.api_key);
        override_string("HAKGYO_VIDEO_API_SECRET", &mut self.video.api_secret);

        override_string("HAKGYO_CHAT_BASE_URL", &mut self.chat.base_url);
        override_string("HAKGYO_CHAT_API_KEY", &mut self.chat.api_key);
        override_string("HAKGYO_CHAT_API_SECRET", &mut self.chat.api_secret);

        override_string("HAKGYO_TRANSLATION_BASE_URL", &mut self.translation.base_url);
        override_string("HAKGYO_TRANSLATION_API_KEY", &mut self.translation.api_key);
        override_string("HAKGYO_TRANSLATION_MODEL", &mut self.translation.model);

        override_string("HAKGYO_DICTIONARY_API_KEY", &mut self.dictionary.api_key);

        override_string("HAKGYO_PUSH_VAPID_SUBJECT", &mut self.push.vapid_subject);
        override_string("HAKGYO_PUSH_VAPID_PUBLIC_KEY", &mut self.push.vapid_public_key);
        override_string(
            "HAKGYO_PUSH_VAPID_PRIVATE_KEY_PEM",
            &mut self.push.vapid_private_key_pem,
        );
    }
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(value) = std::env::var(var) {
        *target = value;
    }
}

/// Invalid values are ignored and the file setting is kept
fn override_parsed<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(value) = std::env::var(var) {
        if let Ok(parsed) = value.parse::<T>() {
            *target = parsed;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
