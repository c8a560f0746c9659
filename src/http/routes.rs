use crate::http::types::{
    HttpError, HttpResult, HttpSuccess, StatusResponse, VerifyWebhookQuery,
};
use crate::http::HttpState;
use crate::relay::types::{OutboundMessageRequest, SendResult, WebhookEnvelope};
use crate::relay::RelayError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::log::{debug, error, warn};

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health",
    tag = "System",
    responses(
        (status = 200, body = crate::http::types::SuccessfulResponse<crate::http::types::StatusResponse>)
    )
))]
pub async fn health() -> HttpResult<StatusResponse> {
    Ok(HttpSuccess(StatusResponse {
        status: "ok",
        message: Some("whatsapp-relay API is running"),
    }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/sys/version",
    tag = "System",
    responses(
        (status = 200, description = "Version retrieved successfully", body = crate::http::types::SuccessfulResponse<String>,
            example = json!({"success": true, "response": "0.1.0"}))
    )
))]
pub async fn sys_version() -> HttpResult<String> {
    Ok(HttpSuccess(crate::VERSION.to_string()))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/whatsapp/send",
    tag = "WhatsApp",
    security(("bearer_auth" = [])),
    request_body = crate::relay::types::OutboundMessageRequest,
    responses(
        (status = 200, body = crate::http::types::SuccessfulResponse<crate::relay::types::SendResult>)
    )
))]
pub async fn whatsapp_send(
    State(state): State<HttpState>,
    payload: Result<Json<OutboundMessageRequest>, JsonRejection>,
) -> HttpResult<SendResult> {
    let Json(request) = payload.map_err(|e| {
        HttpError::new(StatusCode::BAD_REQUEST, "invalid_request", e.body_text())
    })?;

    let result = state.relay.send_message(request).await.map_err(|e| {
        if !e.is_client_error() {
            error!("Send request failed: {e}");
        }
        HttpError::from_relay(&e, "send_failed")
    })?;

    Ok(HttpSuccess(result))
}

/// Inbound notifications. Replies are generated and sent before responding.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/whatsapp/webhook",
    tag = "WhatsApp",
    request_body = crate::relay::types::WebhookEnvelope,
    responses(
        (status = 200, description = "Notification processed", body = crate::http::types::SuccessfulResponse<crate::http::types::StatusResponse>,
            example = json!({"success": true, "response": {"status": "ok"}}))
    )
))]
pub async fn whatsapp_receive_webhook(
    State(state): State<HttpState>,
    payload: Result<Json<Option<WebhookEnvelope>>, JsonRejection>,
) -> HttpResult<StatusResponse> {
    let Json(envelope) = payload.map_err(|e| {
        warn!("Rejecting malformed webhook: {}", e.body_text());
        HttpError::new(StatusCode::BAD_REQUEST, "invalid_webhook", e.body_text())
    })?;

    match state.relay.process_incoming_webhook(envelope.as_ref()).await {
        Ok(()) => {}
        Err(e @ RelayError::InvalidInput) => {
            return Err(HttpError::new(
                StatusCode::BAD_REQUEST,
                "invalid_webhook",
                e.to_string(),
            ))
        }
        Err(e) if state.config.always_acknowledge_webhooks => {
            warn!("Acknowledging webhook despite processing failure: {e}");
        }
        Err(e) => return Err(HttpError::from_relay(&e, "webhook_processing_failed")),
    }

    Ok(HttpSuccess(StatusResponse {
        status: "ok",
        message: None,
    }))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/whatsapp/webhook",
    tag = "WhatsApp",
    params(
        ("hub.mode" = Option<String>, Query, description = "Must be \"subscribe\""),
        ("hub.verify_token" = Option<String>, Query, description = "Configured webhook verify token"),
        ("hub.challenge" = Option<String>, Query, description = "Echoed back on success")
    ),
    responses(
        (status = 200, description = "Challenge echoed back", body = String),
        (status = 403, description = "Webhook verification failed")
    )
))]
pub async fn whatsapp_verify_webhook(
    State(state): State<HttpState>,
    query: Result<Query<VerifyWebhookQuery>, QueryRejection>,
) -> Result<String, HttpError> {
    let challenge = query
        .ok()
        .and_then(|Query(query)| query.accepted_challenge(state.verify_token.as_deref()));

    match challenge {
        Some(challenge) => {
            debug!("Webhook subscription verified");
            Ok(challenge)
        }
        None => {
            warn!("Webhook verification failed");
            Err(HttpError::new(
                StatusCode::FORBIDDEN,
                "verification_failed",
                "Webhook verification failed",
            ))
        }
    }
}
