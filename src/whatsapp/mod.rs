mod types;

use crate::config::WhatsAppConfig;
use crate::relay::types::{OutboundMessageRequest, SendResult, TEXT_MESSAGE_TYPE};
use crate::relay::{MessagingClient, SendFailure, TransportError};
use crate::transport::{build_client, decode_json, BearerClient};
use crate::whatsapp::types::*;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::log::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// WhatsApp Cloud API (Graph API) messages endpoint client.
#[derive(Clone)]
pub struct WhatsAppClient {
    client: BearerClient,
    base_url: String,
}
impl WhatsAppClient {
    pub fn new(client: BearerClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &WhatsAppConfig) -> Result<Self> {
        if config.api_key.is_none() {
            warn!("No WhatsApp API key configured, requests to the Cloud API will be rejected!");
        }

        let client = build_client(REQUEST_TIMEOUT, &config.certificate_paths)?;
        Ok(Self::new(
            BearerClient::new(client, config.api_key.clone()),
            &config.base_url,
        ))
    }

    fn messages_url(&self, phone_number_id: &str) -> String {
        format!("{}/{}/messages", self.base_url, phone_number_id)
    }
}

#[async_trait]
impl MessagingClient for WhatsAppClient {
    async fn send(&self, request: &OutboundMessageRequest) -> Result<SendResult, SendFailure> {
        let message_type = request.message_type();

        // Only text bodies are built, other types are passed through without content.
        let payload = SendMessagePayload {
            messaging_product: MESSAGING_PRODUCT,
            recipient_type: "individual",
            to: &request.to,
            message_type,
            text: (message_type == TEXT_MESSAGE_TYPE).then_some(TextPayload {
                preview_url: false,
                body: &request.content,
            }),
        };

        let response = self
            .client
            .post(&self.messages_url(&request.phone_number_id), &payload)
            .await?;
        let status = response.status();
        let body: SendMessageResponse = decode_json(response).await?;

        if status != StatusCode::OK {
            let error = body.error.unwrap_or_default();
            return Err(SendFailure::new(
                Some(SendResult::failed(error.message.clone())),
                TransportError::Api {
                    message: error.message,
                    code: error.code,
                },
            ));
        }

        match body.messages.into_iter().next() {
            Some(message) => {
                debug!("WhatsApp accepted message {}", message.id);
                Ok(SendResult::sent(message.id))
            }
            None => Err(SendFailure::new(
                Some(SendResult::failed("No message ID returned from API")),
                TransportError::MissingMessageId,
            )),
        }
    }

    async fn mark_as_read(
        &self,
        phone_number_id: &str,
        message_id: &str,
    ) -> Result<(), TransportError> {
        let payload = MarkAsReadPayload {
            messaging_product: MESSAGING_PRODUCT,
            status: "read",
            message_id,
        };

        let status = self
            .client
            .post(&self.messages_url(phone_number_id), &payload)
            .await?
            .status();

        if status != StatusCode::OK {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(())
    }
}
