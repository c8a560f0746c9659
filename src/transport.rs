use crate::relay::TransportError;
use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::log::debug;

/// Build a reqwest client with a timeout and any extra trusted root certificates.
pub fn build_client(timeout: Duration, certificate_paths: &[PathBuf]) -> Result<Client> {
    let builder = Client::builder().timeout(timeout);

    // If there are no certificates, use the base builder.
    if certificate_paths.is_empty() {
        return builder.build().context("Failed to build HTTP client");
    }

    #[cfg(not(any(feature = "tls-rustls", feature = "tls-native")))]
    {
        return Err(anyhow::anyhow!(
            "Client certificates configured but no TLS features enabled. Compile with a TLS backend feature!"
        ));
    }

    #[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
    {
        let mut builder = builder;

        #[cfg(feature = "tls-rustls")]
        {
            builder = builder.use_rustls_tls();
        }

        #[cfg(feature = "tls-native")]
        {
            builder = builder.use_native_tls();
        }

        for certificate_path in certificate_paths {
            let certificate = load_certificate(certificate_path)
                .with_context(|| format!("Failed to load certificate: {certificate_path:?}"))?;
            builder = builder.add_root_certificate(certificate);
        }

        builder.build().context("Failed to build HTTP client")
    }
}

#[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
fn load_certificate(certificate_path: &std::path::Path) -> Result<reqwest::tls::Certificate> {
    let cert_data = std::fs::read(certificate_path)?;

    match certificate_path.extension().and_then(|s| s.to_str()) {
        Some("pem") => return Ok(reqwest::tls::Certificate::from_pem(&cert_data)?),
        Some("der") => return Ok(reqwest::tls::Certificate::from_der(&cert_data)?),
        _ => {}
    }

    // Unknown extension (eg: .crt), sniff the PEM armour.
    if cert_data.starts_with(b"-----BEGIN") {
        Ok(reqwest::tls::Certificate::from_pem(&cert_data)?)
    } else {
        Ok(reqwest::tls::Certificate::from_der(&cert_data)?)
    }
}

/// JSON POST client that authenticates every request with the same bearer token.
#[derive(Clone)]
pub struct BearerClient {
    client: Client,
    bearer_token: Option<String>,
}
impl BearerClient {
    pub fn new(client: Client, bearer_token: Option<String>) -> Self {
        Self {
            client,
            bearer_token: bearer_token.filter(|token| !token.is_empty()),
        }
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<Response, TransportError> {
        let body = serde_json::to_vec(payload)?;
        debug!("POST {url} ({} byte payload)", body.len());

        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        Ok(request.send().await?)
    }
}

/// Read a full response body and decode it as JSON, regardless of status.
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
