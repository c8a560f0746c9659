use crate::http::routes::*;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::{ContentBuilder, RefOr, Response};
use utoipa::Modify;

#[derive(utoipa::OpenApi)]
#[openapi(
    tags(
        (name = "WhatsApp", description = "Message sending and webhook subscription"),
        (name = "System", description = "Health and build information")
    ),
    paths(
        health,
        sys_version,
        whatsapp_send,
        whatsapp_receive_webhook,
        whatsapp_verify_webhook
    ),
    modifiers(&OpenApiModifier)
)]
pub struct ApiDoc;

struct OpenApiModifier;
impl Modify for OpenApiModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info = utoipa::openapi::InfoBuilder::new()
            .title("WhatsApp Relay")
            .version(crate::VERSION)
            .description(Some(env!("CARGO_PKG_DESCRIPTION")))
            .license(Some(
                utoipa::openapi::LicenseBuilder::new()
                    .name(env!("CARGO_PKG_LICENSE"))
                    .url(Some(format!(
                        "https://spdx.org/licenses/{}.html",
                        env!("CARGO_PKG_LICENSE")
                    )))
                    .build(),
            ))
            .build();

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }

        // Shared error responses, all using the same body shape.
        let error_responses = [
            ("400", "Bad request", "invalid_request", "phone number ID is required"),
            ("401", "Unauthorized", "unauthorized", "Invalid token"),
            (
                "500",
                "Internal server error",
                "internal_server_error",
                "An unexpected error occurred",
            ),
        ];
        for path_item in openapi.paths.paths.values_mut() {
            for op in [&mut path_item.get, &mut path_item.post]
                .into_iter()
                .flatten()
            {
                for (status, desc, kind, message) in error_responses {
                    op.responses
                        .responses
                        .entry(status.to_string())
                        .or_insert_with(|| {
                            let content = ContentBuilder::new()
                                .example(Some(serde_json::json!({
                                    "success": false,
                                    "error": kind,
                                    "message": message
                                })))
                                .build();

                            RefOr::T(
                                Response::builder()
                                    .description(desc)
                                    .content("application/json", content)
                                    .build(),
                            )
                        });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_document_lists_webhook_routes() {
        let doc = ApiDoc::openapi();
        let webhook = doc
            .paths
            .paths
            .get("/api/v1/whatsapp/webhook")
            .expect("webhook path");

        assert!(webhook.get.is_some());
        let receive = webhook.post.as_ref().expect("webhook receive operation");
        assert!(receive.request_body.is_some());
        assert!(receive.responses.responses.contains_key("500"));
        assert!(doc.paths.paths.contains_key("/api/v1/whatsapp/send"));
    }
}
