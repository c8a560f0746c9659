use crate::config::LlmConfig;
use crate::relay::{LanguageModel, TransportError};
use crate::transport::{build_client, decode_json, BearerClient};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::log::debug;

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct PromptResponse {
    response: String,
}

/// Client for a prompt-in, response-out chat endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: BearerClient,
    url: String,
}
impl LlmClient {
    pub fn new(client: BearerClient, url: String) -> Self {
        Self { client, url }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = build_client(
            Duration::from_secs(config.timeout_secs),
            &config.certificate_paths,
        )?;
        Ok(Self::new(
            BearerClient::new(client, config.bearer_token.clone()),
            config.url.clone(),
        ))
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn query(&self, prompt: &str) -> Result<String, TransportError> {
        let response = self.client.post(&self.url, &PromptRequest { prompt }).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body: PromptResponse = decode_json(response).await?;
        debug!("Language model replied with {} characters", body.response.len());
        Ok(body.response)
    }
}
