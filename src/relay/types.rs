use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The only outbound message type the Cloud API payload builder knows how to fill.
pub const TEXT_MESSAGE_TYPE: &str = "text";

/// Notification pushed by the platform whenever there is new activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub object: String,

    #[serde(default)]
    pub entry: Vec<Entry>,
}

/// A single business account's batch of changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Entry {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Change {
    #[serde(default)]
    pub value: Value,

    /// Usually "messages", which is the only field the relay acts on.
    #[serde(default)]
    pub field: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Value {
    #[serde(default)]
    pub messaging_product: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<Contact>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<InboundMessage>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<StatusUpdate>,
}

/// The business phone number the change was delivered to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Metadata {
    #[serde(default)]
    pub display_phone_number: String,

    #[serde(default)]
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Contact {
    #[serde(default)]
    pub profile: Profile,

    #[serde(default)]
    pub wa_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Profile {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InboundMessage {
    /// Sender number, exactly as the platform reports it.
    #[serde(default)]
    pub from: String,

    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub timestamp: String,

    #[serde(flatten)]
    pub content: MessageContent,
}
impl InboundMessage {
    /// Text that should be forwarded to the language model, or an empty
    /// string when the message carries none.
    pub fn text_content(&self) -> &str {
        match &self.content {
            MessageContent::Text { text: Some(text) } => &text.body,
            _ => "",
        }
    }
}

/// Message payload, discriminated by the wire `type` field. The platform puts
/// the payload under a key named after the type, eg: `{"type":"image","image":{..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        #[serde(default)]
        text: Option<TextBody>,
    },
    Image {
        #[serde(default)]
        image: Option<MediaBody>,
    },
    Audio {
        #[serde(default)]
        audio: Option<MediaBody>,
    },
    Document {
        #[serde(default)]
        document: Option<MediaBody>,
    },

    #[serde(other)]
    Unsupported,
}
impl MessageContent {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageContent::Text { .. } => "text",
            MessageContent::Image { .. } => "image",
            MessageContent::Audio { .. } => "audio",
            MessageContent::Document { .. } => "document",
            MessageContent::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MediaBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Delivery status notification for a previously sent message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusUpdate {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub timestamp: String,

    #[serde(default)]
    pub recipient_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Conversation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Conversation {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub origin: ConversationOrigin,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConversationOrigin {
    #[serde(default, rename = "type")]
    pub origin_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Pricing {
    #[serde(default)]
    pub billable: bool,

    #[serde(default)]
    pub pricing_model: String,

    #[serde(default)]
    pub category: String,
}

/// Request to deliver a message through the platform's send API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OutboundMessageRequest {
    #[serde(default)]
    pub phone_number_id: String,

    #[serde(default)]
    pub to: String,

    #[serde(default)]
    pub content: String,

    /// Defaults to "text" when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message_type: String,
}
impl OutboundMessageRequest {
    pub fn text(phone_number_id: &str, to: String, content: String) -> Self {
        Self {
            phone_number_id: phone_number_id.to_string(),
            to,
            content,
            message_type: TEXT_MESSAGE_TYPE.to_string(),
        }
    }

    pub fn message_type(&self) -> &str {
        if self.message_type.is_empty() {
            TEXT_MESSAGE_TYPE
        } else {
            &self.message_type
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Sent,
    Failed,
}
impl Display for SendStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SendStatus::Sent => write!(f, "sent"),
            SendStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendResult {
    #[serde(default)]
    pub message_id: String,
    pub status: SendStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
impl SendResult {
    pub fn sent(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            status: SendStatus::Sent,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message_id: String::new(),
            status: SendStatus::Failed,
            message: Some(message.into()),
        }
    }
}
