mod error;
mod normalize;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use error::{RelayError, SendFailure, TransportError};
pub use normalize::{ArgentinaMobile, NumberingPlan, Passthrough, RecipientNormalizer};

use crate::relay::types::{InboundMessage, OutboundMessageRequest, SendResult, WebhookEnvelope};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::log::{debug, error, info, warn};

/// Messaging platform send API.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn send(&self, request: &OutboundMessageRequest) -> Result<SendResult, SendFailure>;

    async fn mark_as_read(
        &self,
        phone_number_id: &str,
        message_id: &str,
    ) -> Result<(), TransportError>;
}

/// Language-model backend that turns a prompt into reply text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<String, TransportError>;
}

/// Answers inbound webhook messages with language-model replies, and sends
/// messages on demand. Holds no per-request state so it's cheap to share.
#[derive(Clone)]
pub struct Relay {
    messaging: Arc<dyn MessagingClient>,
    llm: Arc<dyn LanguageModel>,
    normalizer: Arc<dyn RecipientNormalizer>,
}
impl Relay {
    pub fn new(
        messaging: Arc<dyn MessagingClient>,
        llm: Arc<dyn LanguageModel>,
        normalizer: Arc<dyn RecipientNormalizer>,
    ) -> Self {
        Self {
            messaging,
            llm,
            normalizer,
        }
    }

    /// Validate and send a single message. On a failed send both the error and
    /// the platform's partial result (if any) are returned inside the error.
    pub async fn send_message(
        &self,
        mut request: OutboundMessageRequest,
    ) -> Result<SendResult, RelayError> {
        if request.phone_number_id.is_empty() {
            return Err(RelayError::ValidationFailed("phone number ID"));
        }
        if request.to.is_empty() {
            return Err(RelayError::ValidationFailed("recipient phone number"));
        }
        if request.content.is_empty() {
            return Err(RelayError::ValidationFailed("message content"));
        }
        if request.message_type.is_empty() {
            request.message_type = request.message_type().to_string();
        }

        let result = self.messaging.send(&request).await?;
        debug!(
            "Sent {} message {} to {}",
            request.message_type, result.message_id, request.to
        );
        Ok(result)
    }

    /// Walk every message in the envelope, marking each as read and replying
    /// to text messages. Stops at the first reply that can't be generated or sent.
    pub async fn process_incoming_webhook(
        &self,
        envelope: Option<&WebhookEnvelope>,
    ) -> Result<(), RelayError> {
        let envelope = envelope.ok_or(RelayError::InvalidInput)?;

        for entry in &envelope.entry {
            for change in &entry.changes {
                let value = &change.value;
                debug!(
                    "Webhook change '{}' for entry {}: {} message(s), {} status update(s), phone number id: {}",
                    change.field,
                    entry.id,
                    value.messages.len(),
                    value.statuses.len(),
                    value.metadata.phone_number_id
                );

                for status in &value.statuses {
                    debug!(
                        "Message {} to {} is now {}",
                        status.id, status.recipient_id, status.status
                    );
                }

                for message in &value.messages {
                    self.process_message(message, &value.metadata.phone_number_id)
                        .await
                        .map_err(|e| {
                            error!("Failed to process message {}: {e}", message.id);
                            RelayError::WebhookProcessing(Box::new(e))
                        })?;
                }
            }
        }

        Ok(())
    }

    async fn process_message(
        &self,
        message: &InboundMessage,
        phone_number_id: &str,
    ) -> Result<(), RelayError> {
        let content = message.text_content();

        // Read receipts are best-effort, a failure here must never stop the reply.
        if let Err(e) = self
            .messaging
            .mark_as_read(phone_number_id, &message.id)
            .await
        {
            warn!("Failed to mark message {} as read: {e}", message.id);
        }

        if content.is_empty() {
            debug!(
                "Skipping {} message {} with no text content",
                message.content.kind(),
                message.id
            );
            return Ok(());
        }
        if message.from.is_empty() {
            warn!("Skipping message {} with no sender", message.id);
            return Ok(());
        }

        let reply = self
            .llm
            .query(content)
            .await
            .map_err(RelayError::ReplyGenerationFailed)?;

        let to = self.normalizer.normalize(&message.from).into_owned();
        info!("Replying to message {} from {}", message.id, message.from);

        self.send_message(OutboundMessageRequest::text(phone_number_id, to, reply))
            .await
            .map_err(|e| RelayError::ReplySendFailed(Box::new(e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeLanguageModel, FakeMessagingClient};
    use super::types::*;
    use super::*;

    fn relay(messaging: &Arc<FakeMessagingClient>, llm: &Arc<FakeLanguageModel>) -> Relay {
        Relay::new(messaging.clone(), llm.clone(), Arc::new(ArgentinaMobile))
    }

    fn text_message(id: &str, from: &str, body: &str) -> InboundMessage {
        InboundMessage {
            from: from.to_string(),
            id: id.to_string(),
            timestamp: "1749416383".to_string(),
            content: MessageContent::Text {
                text: Some(TextBody {
                    body: body.to_string(),
                }),
            },
        }
    }

    fn envelope(messages: Vec<InboundMessage>) -> WebhookEnvelope {
        WebhookEnvelope {
            object: "whatsapp_business_account".to_string(),
            entry: vec![Entry {
                id: "entry-1".to_string(),
                changes: vec![Change {
                    field: "messages".to_string(),
                    value: Value {
                        messaging_product: "whatsapp".to_string(),
                        metadata: Metadata {
                            display_phone_number: "15550783881".to_string(),
                            phone_number_id: "106540352242922".to_string(),
                        },
                        messages,
                        ..Default::default()
                    },
                }],
            }],
        }
    }

    fn valid_request() -> OutboundMessageRequest {
        OutboundMessageRequest {
            phone_number_id: "123456789".to_string(),
            to: "541112345678".to_string(),
            content: "Hello, World!".to_string(),
            message_type: "text".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_entries_succeed() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::replying("unused"));

        let result = relay(&messaging, &llm)
            .process_incoming_webhook(Some(&WebhookEnvelope::default()))
            .await;

        assert!(result.is_ok());
        assert!(messaging.sent().is_empty());
        assert!(messaging.marked_read().is_empty());
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_envelope_is_invalid_input() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::replying("unused"));

        let result = relay(&messaging, &llm)
            .process_incoming_webhook(None)
            .await;

        assert!(matches!(result, Err(RelayError::InvalidInput)));
    }

    #[tokio::test]
    async fn test_text_message_is_answered() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::replying("Hi there"));
        let envelope = envelope(vec![text_message("wamid.1", "5491112345678", "Hello")]);

        relay(&messaging, &llm)
            .process_incoming_webhook(Some(&envelope))
            .await
            .unwrap();

        assert_eq!(llm.prompts(), vec!["Hello".to_string()]);
        assert_eq!(
            messaging.marked_read(),
            vec![("106540352242922".to_string(), "wamid.1".to_string())]
        );
        assert_eq!(
            messaging.sent(),
            vec![OutboundMessageRequest {
                phone_number_id: "106540352242922".to_string(),
                to: "541112345678".to_string(),
                content: "Hi there".to_string(),
                message_type: "text".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_reply_uses_configured_normalizer() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::replying("Hi there"));
        let relay = Relay::new(messaging.clone(), llm.clone(), Arc::new(Passthrough));
        let envelope = envelope(vec![text_message("wamid.1", "5491112345678", "Hello")]);

        relay.process_incoming_webhook(Some(&envelope)).await.unwrap();
        assert_eq!(messaging.sent()[0].to, "5491112345678");
    }

    #[tokio::test]
    async fn test_mark_as_read_failure_is_ignored() {
        let messaging = Arc::new(FakeMessagingClient::failing_mark_as_read());
        let llm = Arc::new(FakeLanguageModel::replying("Hi there"));
        let envelope = envelope(vec![text_message("wamid.1", "5491112345678", "Hello")]);

        let result = relay(&messaging, &llm)
            .process_incoming_webhook(Some(&envelope))
            .await;

        assert!(result.is_ok());
        assert_eq!(messaging.marked_read().len(), 1);
        assert_eq!(messaging.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_aborts_without_sending() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::failing());
        let envelope = envelope(vec![
            text_message("wamid.1", "5491112345678", "Hello"),
            text_message("wamid.2", "5491112345678", "Anyone there?"),
        ]);

        let err = relay(&messaging, &llm)
            .process_incoming_webhook(Some(&envelope))
            .await
            .unwrap_err();

        match err {
            RelayError::WebhookProcessing(inner) => {
                assert!(matches!(*inner, RelayError::ReplyGenerationFailed(_)))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(messaging.sent().is_empty());

        // The batch stops at the first fatal error.
        assert_eq!(llm.prompts().len(), 1);
        assert_eq!(messaging.marked_read().len(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_aborts_batch() {
        let messaging = Arc::new(FakeMessagingClient::failing_send(Some(
            SendResult::failed("Invalid phone number"),
        )));
        let llm = Arc::new(FakeLanguageModel::replying("Hi there"));
        let envelope = envelope(vec![
            text_message("wamid.1", "5491112345678", "Hello"),
            text_message("wamid.2", "5491112345678", "Hello again"),
        ]);

        let err = relay(&messaging, &llm)
            .process_incoming_webhook(Some(&envelope))
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("failed to process messages"));
        match &err {
            RelayError::WebhookProcessing(inner) => {
                assert!(matches!(**inner, RelayError::ReplySendFailed(_)))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.send_result().map(|r| r.status),
            Some(SendStatus::Failed)
        );
        assert_eq!(messaging.sent().len(), 1);
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_image_message_is_only_marked_read() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::replying("unused"));
        let image = InboundMessage {
            from: "5491112345678".to_string(),
            id: "wamid.img".to_string(),
            timestamp: String::new(),
            content: MessageContent::Image {
                image: Some(MediaBody {
                    id: Some("media-1".to_string()),
                    mime_type: Some("image/jpeg".to_string()),
                    ..Default::default()
                }),
            },
        };

        let result = relay(&messaging, &llm)
            .process_incoming_webhook(Some(&envelope(vec![image])))
            .await;

        assert!(result.is_ok());
        assert_eq!(
            messaging.marked_read(),
            vec![("106540352242922".to_string(), "wamid.img".to_string())]
        );
        assert!(llm.prompts().is_empty());
        assert!(messaging.sent().is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_and_unsupported_are_skipped() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::replying("unused"));
        let mut no_body = text_message("wamid.1", "5491112345678", "");
        no_body.content = MessageContent::Text { text: None };
        let unsupported = InboundMessage {
            content: MessageContent::Unsupported,
            ..text_message("wamid.2", "5491112345678", "")
        };
        let messages = vec![
            text_message("wamid.0", "5491112345678", ""),
            no_body,
            unsupported,
        ];

        relay(&messaging, &llm)
            .process_incoming_webhook(Some(&envelope(messages)))
            .await
            .unwrap();

        assert_eq!(messaging.marked_read().len(), 3);
        assert!(llm.prompts().is_empty());
        assert!(messaging.sent().is_empty());
    }

    #[tokio::test]
    async fn test_message_without_sender_is_skipped() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::replying("Hi there"));
        let messages = vec![
            text_message("wamid.anon", "", "Hello"),
            text_message("wamid.1", "5491112345678", "Hello"),
        ];

        relay(&messaging, &llm)
            .process_incoming_webhook(Some(&envelope(messages)))
            .await
            .unwrap();

        assert_eq!(llm.prompts(), vec!["Hello".to_string()]);
        let sent = messaging.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "541112345678");
    }

    #[tokio::test]
    async fn test_processes_every_entry_and_change() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::replying("Hi there"));
        let mut envelope = envelope(vec![text_message("wamid.1", "5491112345678", "one")]);
        let mut second = envelope.entry[0].clone();
        second.changes[0].value.metadata.phone_number_id = "999".to_string();
        second.changes[0].value.messages = vec![
            text_message("wamid.2", "14155550123", "two"),
            text_message("wamid.3", "541112345678", "three"),
        ];
        envelope.entry.push(second);

        relay(&messaging, &llm)
            .process_incoming_webhook(Some(&envelope))
            .await
            .unwrap();

        assert_eq!(llm.prompts(), vec!["one", "two", "three"]);
        let sent = messaging.sent();
        let recipients: Vec<(&str, &str)> = sent
            .iter()
            .map(|r| (r.phone_number_id.as_str(), r.to.as_str()))
            .collect();
        assert_eq!(
            recipients,
            vec![
                ("106540352242922", "541112345678"),
                ("999", "14155550123"),
                ("999", "541112345678"),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_message_success() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::replying("unused"));

        let result = relay(&messaging, &llm)
            .send_message(valid_request())
            .await
            .unwrap();

        assert_eq!(result.status, SendStatus::Sent);
        assert_eq!(messaging.sent(), vec![valid_request()]);
    }

    #[tokio::test]
    async fn test_send_message_defaults_type_to_text() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::replying("unused"));
        let request = OutboundMessageRequest {
            message_type: String::new(),
            ..valid_request()
        };

        relay(&messaging, &llm).send_message(request).await.unwrap();
        assert_eq!(messaging.sent()[0].message_type, "text");
    }

    #[tokio::test]
    async fn test_send_message_validation_order() {
        let messaging = Arc::new(FakeMessagingClient::default());
        let llm = Arc::new(FakeLanguageModel::replying("unused"));
        let relay = relay(&messaging, &llm);

        let err = relay
            .send_message(OutboundMessageRequest {
                phone_number_id: String::new(),
                ..valid_request()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ValidationFailed(_)));
        assert!(err.is_client_error());
        assert!(err.to_string().contains("phone number ID"));

        // Everything missing still reports the phone number ID first.
        let err = relay
            .send_message(OutboundMessageRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "phone number ID is required");

        let err = relay
            .send_message(OutboundMessageRequest {
                to: String::new(),
                content: String::new(),
                ..valid_request()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "recipient phone number is required");

        let err = relay
            .send_message(OutboundMessageRequest {
                content: String::new(),
                ..valid_request()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "message content is required");

        assert!(messaging.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_failure_keeps_result() {
        let messaging = Arc::new(FakeMessagingClient::failing_send(Some(
            SendResult::failed("Invalid phone number"),
        )));
        let llm = Arc::new(FakeLanguageModel::replying("unused"));

        let err = relay(&messaging, &llm)
            .send_message(valid_request())
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("failed to send message"));
        assert!(!err.is_client_error());
        let result = err.send_result().expect("partial result");
        assert_eq!(result.status, SendStatus::Failed);
        assert_eq!(result.message.as_deref(), Some("Invalid phone number"));
        assert_eq!(messaging.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_send_message_unreachable_platform() {
        let messaging = Arc::new(FakeMessagingClient::failing_send(None));
        let llm = Arc::new(FakeLanguageModel::replying("unused"));

        let err = relay(&messaging, &llm)
            .send_message(valid_request())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RelayError::SendFailed {
                result: None,
                source: TransportError::Status(503)
            }
        ));
        assert!(err.send_result().is_none());
    }
}
