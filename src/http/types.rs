use crate::relay::RelayError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SuccessfulResponse<T> {
    pub success: bool,
    pub response: T,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,

    /// Machine readable error kind, eg: "invalid_request".
    pub error: &'static str,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

pub struct HttpSuccess<T>(pub T);
impl<T: Serialize> IntoResponse for HttpSuccess<T> {
    fn into_response(self) -> Response {
        Json(SuccessfulResponse {
            success: true,
            response: self.0,
        })
        .into_response()
    }
}

#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
    pub result: Option<serde_json::Value>,
}
impl HttpError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            result: None,
        }
    }

    /// Map a relay failure, using `kind` for failures that aren't the caller's fault.
    pub fn from_relay(error: &RelayError, kind: &'static str) -> Self {
        let (status, kind) = if error.is_client_error() {
            (StatusCode::BAD_REQUEST, "invalid_request")
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, kind)
        };

        Self {
            status,
            kind,
            message: error.to_string(),
            result: error
                .send_result()
                .and_then(|result| serde_json::to_value(result).ok()),
        }
    }
}
impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                success: false,
                error: self.kind,
                message: self.message,
                result: self.result,
            }),
        )
            .into_response()
    }
}

pub type HttpResult<T> = Result<HttpSuccess<T>, HttpError>;

#[derive(Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusResponse {
    pub status: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// Query sent by Meta when subscribing the webhook.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyWebhookQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,

    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,

    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}
impl VerifyWebhookQuery {
    /// The challenge to echo back, if this is a subscription with the expected token.
    pub fn accepted_challenge(self, expected_token: Option<&str>) -> Option<String> {
        let expected_token = expected_token.filter(|token| !token.is_empty())?;
        let token_matches = self.verify_token.as_deref() == Some(expected_token);

        if self.mode.as_deref() == Some("subscribe") && token_matches {
            Some(self.challenge.unwrap_or_default())
        } else {
            None
        }
    }
}
