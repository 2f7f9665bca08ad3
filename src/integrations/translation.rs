//! Streaming translation through an OpenAI-compatible chat completions API

use super::{check_status, http_client, IntegrationError};
use crate::config::TranslationConfig;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{json, Value};

/// Stream of translated text fragments
pub type TextStream = BoxStream<'static, Result<String, IntegrationError>>;

#[async_trait]
pub trait Translator: Send + Sync {
    /// Start translating `text` into `target` and stream the output as it arrives
    async fn translate(&self, text: &str, target: &str) -> Result<TextStream, IntegrationError>;
}

pub struct OpenAiTranslator {
    config: TranslationConfig,
    client: reqwest::Client,
}

impl OpenAiTranslator {
    pub fn new(config: TranslationConfig) -> Result<Self, IntegrationError> {
        Ok(Self {
            config,
            client: http_client()?,
        })
    }
}

/// Human-readable language name for a short code
pub fn language_name(code: &str) -> &str {
    match code.to_ascii_lowercase().as_str() {
        "ko" => "Korean",
        "id" => "Indonesian",
        "en" => "English",
        _ => code,
    }
}

fn system_prompt(target: &str) -> String {
    format!(
        "You are a translator for Korean language learners. Translate the user's text into {}. \
         Reply with the translation only.",
        language_name(target)
    )
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<TextStream, IntegrationError> {
        if !self.config.is_configured() {
            return Err(IntegrationError::NotConfigured("Translation service"));
        }

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "model": self.config.model,
                "stream": true,
                "messages": [
                    { "role": "system", "content": system_prompt(target) },
                    { "role": "user", "content": text },
                ],
            }))
            .send()
            .await?;
        let response = check_status(response).await?;

        let fragments = response
            .bytes_stream()
            .scan(SseDecoder::default(), |decoder, chunk| {
                let items: Vec<Result<String, IntegrationError>> = match chunk {
                    Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(IntegrationError::Http(e))],
                };
                futures::future::ready(Some(items))
            })
            .flat_map(stream::iter)
            .boxed();

        Ok(fragments)
    }
}

/// Incremental decoder for `text/event-stream` completion chunks.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence, so
/// input is buffered until a full line is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Feed bytes and return the content deltas completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.done {
                continue;
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(delta) = self.decode_line(line.trim_end_matches(['\r', '\n'])) {
                out.push(delta);
            }
        }
        out
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &str) -> Option<String> {
        let payload = line.strip_prefix("data:")?.trim();
        if payload == "[DONE]" {
            self.done = true;
            return None;
        }

        let value: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed completion chunk");
                return None;
            }
        };

        value["choices"][0]["delta"]["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
