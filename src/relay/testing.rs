//! Recording fakes for the relay's collaborators.

use crate::relay::types::{OutboundMessageRequest, SendResult};
use crate::relay::{LanguageModel, MessagingClient, SendFailure, TransportError};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeMessagingClient {
    fail_mark_as_read: bool,
    fail_send: Option<Option<SendResult>>,
    sent: Mutex<Vec<OutboundMessageRequest>>,
    marked_read: Mutex<Vec<(String, String)>>,
}
impl FakeMessagingClient {
    pub fn failing_mark_as_read() -> Self {
        Self {
            fail_mark_as_read: true,
            ..Default::default()
        }
    }

    /// Every send fails, returning `result` alongside the error.
    pub fn failing_send(result: Option<SendResult>) -> Self {
        Self {
            fail_send: Some(result),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessageRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn marked_read(&self) -> Vec<(String, String)> {
        self.marked_read.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingClient for FakeMessagingClient {
    async fn send(&self, request: &OutboundMessageRequest) -> Result<SendResult, SendFailure> {
        let count = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(request.clone());
            sent.len()
        };

        match &self.fail_send {
            Some(Some(result)) => Err(SendFailure::new(
                Some(result.clone()),
                TransportError::Api {
                    message: result.message.clone().unwrap_or_default(),
                    code: 400,
                },
            )),
            Some(None) => Err(TransportError::Status(503).into()),
            None => Ok(SendResult::sent(format!("wamid.sent.{count}"))),
        }
    }

    async fn mark_as_read(
        &self,
        phone_number_id: &str,
        message_id: &str,
    ) -> Result<(), TransportError> {
        self.marked_read
            .lock()
            .unwrap()
            .push((phone_number_id.to_string(), message_id.to_string()));

        if self.fail_mark_as_read {
            Err(TransportError::Status(500))
        } else {
            Ok(())
        }
    }
}

pub struct FakeLanguageModel {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}
impl FakeLanguageModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    async fn query(&self, prompt: &str) -> Result<String, TransportError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().ok_or(TransportError::Status(502))
    }
}
