//! Image and audio storage on the local upload directory

use crate::config::{UploadConfig, UploadKind};
use crate::services::error::{ServiceError, ServiceResult};
use anyhow::Context;
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

/// A stored file and where it is served from
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

pub struct UploadService {
    config: UploadConfig,
}

impl UploadService {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Largest body accepted for any kind
    pub fn body_limit(&self) -> usize {
        self.config.max_image_size.max(self.config.max_audio_size) as usize
    }

    /// Validate and write the file under `<path>/<kind>/<uuid>.<ext>`
    pub async fn store(&self, kind: UploadKind, content_type: &str, data: &[u8]) -> ServiceResult<StoredFile> {
        if !self.config.is_type_allowed(kind, content_type) {
            return Err(ServiceError::validation(format!(
                "Invalid file type: {}",
                content_type
            )));
        }
        if data.is_empty() {
            return Err(ServiceError::validation("File is empty"));
        }
        let max = self.config.max_size(kind);
        if data.len() as u64 > max {
            return Err(ServiceError::validation(format!(
                "File too large. Maximum size: {} MB",
                max / 1024 / 1024
            )));
        }

        let dir = self.config.path.join(kind.dir_name());
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload dir {}", dir.display()))?;

        let filename = format!("{}.{}", Uuid::new_v4(), self.config.get_extension(content_type));
        fs::write(dir.join(&filename), data)
            .await
            .context("Failed to save uploaded file")?;

        tracing::debug!(kind = kind.dir_name(), filename = %filename, size = data.len(), "File stored");

        Ok(StoredFile {
            url: format!(
                "{}/{}/{}",
                self.config.public_prefix.trim_end_matches('/'),
                kind.dir_name(),
                filename
            ),
            filename,
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }
}
