use serde::{Deserialize, Serialize};

pub const MESSAGING_PRODUCT: &str = "whatsapp";

#[derive(Debug, Serialize)]
pub struct SendMessagePayload<'a> {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: &'a str,

    #[serde(rename = "type")]
    pub message_type: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextPayload<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TextPayload<'a> {
    pub preview_url: bool,
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct MarkAsReadPayload<'a> {
    pub messaging_product: &'static str,
    pub status: &'static str,
    pub message_id: &'a str,
}

/// Body returned by the messages endpoint, either a message list or an error.
#[derive(Debug, Default, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub messages: Vec<SentMessage>,

    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub code: i64,
}
