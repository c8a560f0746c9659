use crate::config::AppConfig;
use crate::llm::LlmClient;
use crate::relay::Relay;
use crate::whatsapp::WhatsAppClient;
use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::log::{error, info, warn};

#[cfg(feature = "http-server")]
use crate::{config::HTTPConfig, http::create_app};

#[cfg(feature = "sentry")]
pub type SentryGuard = Option<sentry::ClientInitGuard>;

#[cfg(not(feature = "sentry"))]
pub type SentryGuard = Option<()>;

pub struct AppHandles {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    _sentry_guard: SentryGuard,
}
impl AppHandles {
    pub async fn new(config: AppConfig, _sentry_guard: SentryGuard) -> Result<AppHandles> {
        let mut tasks = Vec::new();

        let messaging = WhatsAppClient::from_config(&config.whatsapp)?;
        let llm = LlmClient::from_config(&config.llm)?;
        let normalizer = config.relay.recipient_normalization.normalizer();
        info!(
            "Relaying replies from {} with {:?} recipient normalization",
            config.llm.url, config.relay.recipient_normalization
        );

        #[cfg_attr(not(feature = "http-server"), allow(unused_variables))]
        let relay = Relay::new(Arc::new(messaging), Arc::new(llm), normalizer);

        // Setup HTTP server if enabled.
        #[cfg(feature = "http-server")]
        if let Some(http_handle) = Self::start_http_server(
            config.http,
            relay,
            config.whatsapp.webhook_verify_token,
            _sentry_guard.is_some(),
        )? {
            tasks.push(("HTTP Server", http_handle));
        }

        #[cfg(not(feature = "http-server"))]
        warn!("Built without the http-server feature, webhooks can't be received!");

        tasks.push(("Shutdown Signal", Self::start_shutdown_watcher()));

        Ok(AppHandles {
            tasks,
            _sentry_guard,
        })
    }

    pub async fn run(self) {
        let futures: Vec<_> = self
            .tasks
            .into_iter()
            .map(|(name, handle)| {
                info!("Starting task: {name}");
                Box::pin(async move {
                    match handle.await {
                        Ok(_) => info!("{name} task completed!"),
                        Err(e) => error!("{name} task failed: {e:?}!"),
                    }
                })
            })
            .collect();

        // Wait for any task to complete. All handles are boxed, so when dropped they are cancelled.
        let (_, _, remaining) = futures::future::select_all(futures).await;
        drop(remaining);
    }

    fn start_shutdown_watcher() -> JoinHandle<()> {
        tokio::spawn(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl-C, shutting down"),
                Err(e) => warn!("Failed to listen for Ctrl-C: {e:?}"),
            }
        })
    }

    #[cfg(feature = "http-server")]
    fn start_http_server(
        config: HTTPConfig,
        relay: Relay,
        verify_token: Option<String>,
        _sentry_enabled: bool,
    ) -> Result<Option<JoinHandle<()>>> {
        if !config.enabled {
            info!("HTTP server disabled in config");
            return Ok(None);
        }
        if verify_token.as_deref().is_none_or(str::is_empty) {
            warn!("No webhook verify token configured, webhook subscriptions will be rejected!");
        }

        let address = config.address;
        let tls_config = config.tls.clone();
        let auth_token = std::env::var("RELAY_HTTP_AUTH_TOKEN").ok();

        let app = create_app(config, relay, verify_token, auth_token, _sentry_enabled)?;
        let handle = tokio::spawn(async move {
            let result = match tls_config {
                Some(_tls_config) => {
                    #[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
                    {
                        info!("Starting HTTPS (secure) server on {address}");

                        #[cfg(feature = "tls-rustls")]
                        {
                            let _ = rustls::crypto::CryptoProvider::install_default(
                                rustls::crypto::aws_lc_rs::default_provider(),
                            );
                            match axum_server::tls_rustls::RustlsConfig::from_pem_file(
                                &_tls_config.certificate_path,
                                &_tls_config.key_path,
                            )
                            .await
                            {
                                Ok(tls) => axum_server::bind_rustls(address, tls)
                                    .serve(app.into_make_service())
                                    .await
                                    .map_err(anyhow::Error::from),
                                Err(e) => Err(anyhow::Error::from(e)
                                    .context("Failed to load rustls TLS certificates")),
                            }
                        }

                        #[cfg(all(feature = "tls-native", not(feature = "tls-rustls")))]
                        {
                            match axum_server::tls_openssl::OpenSSLConfig::from_pem_file(
                                &_tls_config.certificate_path,
                                &_tls_config.key_path,
                            ) {
                                Ok(tls) => axum_server::bind_openssl(address, tls)
                                    .serve(app.into_make_service())
                                    .await
                                    .map_err(anyhow::Error::from),
                                Err(e) => Err(anyhow::Error::from(e)
                                    .context("Failed to load openssl TLS certificates")),
                            }
                        }
                    }

                    #[cfg(not(any(feature = "tls-rustls", feature = "tls-native")))]
                    Err(anyhow::anyhow!(
                        "HTTP Server TLS configuration provided but no TLS features enabled. Compile with a TLS backend feature!"
                    ))
                }
                None => {
                    info!("Starting HTTP (insecure) server on {address}");
                    axum_server::bind(address)
                        .serve(app.into_make_service())
                        .await
                        .map_err(anyhow::Error::from)
                }
            };

            if let Err(e) = result {
                error!("Server error: {e:?}");

                #[cfg(feature = "sentry")]
                sentry_anyhow::capture_anyhow(&e);
            }
        });

        Ok(Some(handle))
    }
}
