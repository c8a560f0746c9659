use crate::relay::types::SendResult;

/// Failure talking to the messaging platform or the language model.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("failed to execute request: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("API error: {message} (code: {code})")]
    Api { message: String, code: i64 },

    #[error("API error: status code {0}")]
    Status(u16),

    #[error("no message ID returned from API")]
    MissingMessageId,
}

/// A failed send, along with whatever result the platform reported before failing.
#[derive(thiserror::Error, Debug)]
#[error("{error}")]
pub struct SendFailure {
    pub result: Option<SendResult>,

    #[source]
    pub error: TransportError,
}
impl SendFailure {
    pub fn new(result: Option<SendResult>, error: TransportError) -> Self {
        Self { result, error }
    }
}
impl From<TransportError> for SendFailure {
    fn from(error: TransportError) -> Self {
        Self::new(None, error)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("webhook data cannot be empty")]
    InvalidInput,

    #[error("{0} is required")]
    ValidationFailed(&'static str),

    #[error("failed to send message: {source}")]
    SendFailed {
        result: Option<SendResult>,

        #[source]
        source: TransportError,
    },

    #[error("failed to generate reply: {0}")]
    ReplyGenerationFailed(#[source] TransportError),

    #[error("failed to send auto-reply: {0}")]
    ReplySendFailed(#[source] Box<RelayError>),

    #[error("failed to process messages: {0}")]
    WebhookProcessing(#[source] Box<RelayError>),
}
impl RelayError {
    /// The platform's structured result for a failed send, if it returned one.
    pub fn send_result(&self) -> Option<&SendResult> {
        match self {
            RelayError::SendFailed { result, .. } => result.as_ref(),
            RelayError::ReplySendFailed(inner) | RelayError::WebhookProcessing(inner) => {
                inner.send_result()
            }
            _ => None,
        }
    }

    /// Errors caused by the caller's input rather than a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::InvalidInput | RelayError::ValidationFailed(_)
        )
    }
}
impl From<SendFailure> for RelayError {
    fn from(failure: SendFailure) -> Self {
        RelayError::SendFailed {
            result: failure.result,
            source: failure.error,
        }
    }
}
