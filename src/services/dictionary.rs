//! Cached dictionary lookups

use crate::cache::{CacheLayer, MemoryCache};
use crate::integrations::Dictionary;
use crate::services::error::{ServiceError, ServiceResult};
use std::sync::Arc;
use std::time::Duration;

const CACHE_PREFIX: &str = "dict:";

pub struct DictionaryService {
    dictionary: Arc<dyn Dictionary>,
    cache: Arc<MemoryCache>,
    ttl: Duration,
}

impl DictionaryService {
    pub fn new(dictionary: Arc<dyn Dictionary>, cache: Arc<MemoryCache>, ttl: Duration) -> Self {
        Self {
            dictionary,
            cache,
            ttl,
        }
    }

    /// Upstream XML for a headword, served from cache when possible
    pub async fn search(&self, query: &str) -> ServiceResult<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ServiceError::validation("Query cannot be empty"));
        }
        if query.chars().count() > 50 {
            return Err(ServiceError::validation("Query is too long"));
        }

        let key = format!("{}{}", CACHE_PREFIX, query);
        match self.cache.get::<String>(&key).await {
            Ok(Some(xml)) => return Ok(xml),
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Ignoring unreadable dictionary cache entry"),
        }

        let xml = self.dictionary.search(query).await?;
        if let Err(e) = self.cache.set(&key, &xml, self.ttl).await {
            tracing::warn!(key = %key, error = %e, "Failed to cache dictionary response");
        }
        Ok(xml)
    }
}
