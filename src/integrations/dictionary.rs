//! Korean learner's dictionary (KRDict open API)

use super::{check_status, http_client, IntegrationError};
use crate::config::DictionaryConfig;
use async_trait::async_trait;

#[async_trait]
pub trait Dictionary: Send + Sync {
    /// Search a headword; returns the upstream XML document unchanged
    async fn search(&self, query: &str) -> Result<String, IntegrationError>;
}

pub struct KrDictClient {
    config: DictionaryConfig,
    client: reqwest::Client,
}

impl KrDictClient {
    pub fn new(config: DictionaryConfig) -> Result<Self, IntegrationError> {
        Ok(Self {
            config,
            client: http_client()?,
        })
    }
}

#[async_trait]
impl Dictionary for KrDictClient {
    async fn search(&self, query: &str) -> Result<String, IntegrationError> {
        if !self.config.is_configured() {
            return Err(IntegrationError::NotConfigured("Dictionary service"));
        }

        let trans_lang = self.config.trans_lang.to_string();
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("q", query),
                ("translated", "y"),
                ("trans_lang", trans_lang.as_str()),
            ])
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        // KRDict reports key and quota problems as an <error> document with HTTP 200
        if body.contains("<error>") {
            return Err(IntegrationError::InvalidResponse(
                body.chars().take(200).collect(),
            ));
        }
        Ok(body)
    }
}
