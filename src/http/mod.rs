mod routes;
mod types;

#[cfg(feature = "openapi")]
mod openapi;

use crate::config::HTTPConfig;
use crate::http::routes::*;
use crate::http::types::HttpError;
use crate::relay::Relay;
use anyhow::{bail, Result};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use std::any::Any;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::log::{debug, error, warn};

#[cfg(feature = "openapi")]
use utoipa::OpenApi;

#[cfg(feature = "sentry")]
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};

#[derive(Clone)]
pub struct HttpState {
    pub relay: Relay,
    pub config: HTTPConfig,
    pub verify_token: Option<String>,
}

async fn auth_middleware(
    axum::extract::State(expected_token): axum::extract::State<String>,
    headers: axum::http::HeaderMap,
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, HttpError> {
    let auth_header = headers.get("authorization").ok_or(HttpError::new(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "Missing authorization header",
    ))?;

    let auth_str = auth_header.to_str().map_err(|_| {
        HttpError::new(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "Invalid authorization header",
        )
    })?;

    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str).trim();
    if token != expected_token {
        return Err(HttpError::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Invalid token",
        ));
    }

    Ok(next.run(request).await)
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "An unexpected error occurred".to_string()
    };

    error!("Request handler panicked: {message}");
    HttpError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_server_error",
        message,
    )
    .into_response()
}

pub fn create_app(
    config: HTTPConfig,
    relay: Relay,
    verify_token: Option<String>,
    auth_token: Option<String>,
    _sentry: bool,
) -> Result<axum::Router> {
    let mut send_router =
        axum::Router::new().route("/api/v1/whatsapp/send", post(whatsapp_send));

    // Only the send route can be authenticated, Meta doesn't send a token with webhooks.
    if config.require_authentication {
        match auth_token.filter(|token| !token.is_empty()) {
            Some(token) => {
                debug!("Adding HTTP authentication middleware to send route!");
                send_router =
                    send_router.layer(axum::middleware::from_fn_with_state(token, auth_middleware));
            }
            None => bail!("Missing required RELAY_HTTP_AUTH_TOKEN environment variable, and require_authentication is enabled!"),
        }
    } else {
        warn!("Serving send route without authentication middleware, as require_authentication is disabled!");
    }

    #[cfg_attr(not(feature = "openapi"), allow(unused_mut))]
    let mut router = axum::Router::new()
        .route("/health", get(health))
        .route("/sys/version", get(sys_version))
        .route(
            "/api/v1/whatsapp/webhook",
            post(whatsapp_receive_webhook).get(whatsapp_verify_webhook),
        )
        .merge(send_router);

    #[cfg(feature = "openapi")]
    {
        debug!("Adding OpenAPI SwaggerUi at /docs!");
        router = router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs")
                .url("/docs/openapi.json", openapi::ApiDoc::openapi()),
        );
    }

    #[cfg_attr(not(feature = "sentry"), allow(unused_mut))]
    let mut router = router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(SetResponseHeaderLayer::overriding(
                HeaderName::from_static("x-version"),
                HeaderValue::from_static(crate::VERSION),
            ))
            .layer(CorsLayer::permissive()),
    );

    // If Sentry is enabled, include axum integration layers.
    #[cfg(feature = "sentry")]
    if _sentry {
        debug!("Adding Sentry HTTP layer!");
        router = router
            .layer(
                ServiceBuilder::new()
                    .layer(NewSentryLayer::<axum::http::Request<axum::body::Body>>::new_from_top()),
            )
            .layer(ServiceBuilder::new().layer(SentryHttpLayer::new().enable_transaction()))
    }

    let state = HttpState {
        relay,
        config,
        verify_token,
    };
    Ok(router.with_state(state))
}
