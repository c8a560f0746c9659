use crate::relay::NumberingPlan;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::log::info;

#[cfg(feature = "http-server")]
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[cfg(feature = "http-server")]
    #[serde(default)]
    pub http: HTTPConfig,

    #[cfg(feature = "sentry")]
    pub sentry: Option<SentryConfig>,
}
impl AppConfig {
    /// Load the TOML config, then apply environment overrides. A missing file is
    /// only an error when the path was given explicitly.
    pub fn load(config_filepath: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_filepath {
            Some(config_path) => Self::from_file(&config_path)?,
            None => {
                let config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if config_path.exists() {
                    Self::from_file(&config_path)?
                } else {
                    info!("No {DEFAULT_CONFIG_PATH} found, using defaults and environment");
                    Self::default()
                }
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;

        toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse TOML config file: {config_path:?}"))
    }

    /// Environment variables win over file values. Empty values are treated as unset.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(api_key) = var("WHATSAPP_API_KEY") {
            self.whatsapp.api_key = Some(api_key);
        }
        if let Some(base_url) = var("WHATSAPP_BASE_URL") {
            self.whatsapp.base_url = base_url;
        }
        if let Some(verify_token) = var("WEBHOOK_VERIFY_TOKEN") {
            self.whatsapp.webhook_verify_token = Some(verify_token);
        }
        if let Some(url) = var("LLM_URL") {
            self.llm.url = url;
        }
        if let Some(bearer_token) = var("LLM_BEARER_TOKEN") {
            self.llm.bearer_token = Some(bearer_token);
        }

        #[cfg(feature = "http-server")]
        if let Some(port) = var("SERVER_PORT") {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid SERVER_PORT: {port}"))?;
            self.http.address.set_port(port);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_whatsapp_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Token Meta echoes back when subscribing the webhook. Verification always
    /// fails while this is unset.
    #[serde(default)]
    pub webhook_verify_token: Option<String>,

    #[serde(default, deserialize_with = "deserialize_existing_files")]
    pub certificate_paths: Vec<PathBuf>,
}
impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            base_url: default_whatsapp_base_url(),
            api_key: None,
            webhook_verify_token: None,
            certificate_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub url: String,

    #[serde(default)]
    pub bearer_token: Option<String>,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, deserialize_with = "deserialize_existing_files")]
    pub certificate_paths: Vec<PathBuf>,
}
impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_llm_url(),
            bearer_token: None,
            timeout_secs: default_llm_timeout_secs(),
            certificate_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub recipient_normalization: NumberingPlan,
}

#[cfg(feature = "sentry")]
#[derive(Debug, Deserialize)]
pub struct SentryConfig {
    pub dsn: String,

    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub server_name: Option<String>,

    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_true")]
    pub send_default_pii: bool,
}

#[cfg(feature = "http-server")]
#[derive(Debug, Clone, Deserialize)]
pub struct HTTPConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_http_address")]
    pub address: SocketAddr,

    /// Protects the send endpoint with `RELAY_HTTP_AUTH_TOKEN`. The webhook
    /// routes are always open as Meta can't send a bearer token.
    #[serde(default)]
    pub require_authentication: bool,

    /// Answer 200 to webhook deliveries even when processing fails, so the
    /// platform doesn't redeliver them.
    #[serde(default)]
    pub always_acknowledge_webhooks: bool,

    #[serde(default)]
    pub tls: Option<TLSConfig>,
}
#[cfg(feature = "http-server")]
impl Default for HTTPConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            address: default_http_address(),
            require_authentication: false,
            always_acknowledge_webhooks: false,
            tls: None,
        }
    }
}

#[cfg_attr(
    not(any(feature = "tls-rustls", feature = "tls-native")),
    allow(dead_code)
)]
#[cfg(feature = "http-server")]
#[derive(Debug, Clone, Deserialize)]
pub struct TLSConfig {
    #[serde(deserialize_with = "deserialize_existing_file")]
    pub certificate_path: PathBuf,

    #[serde(deserialize_with = "deserialize_existing_file")]
    pub key_path: PathBuf,
}

fn default_whatsapp_base_url() -> String {
    "https://graph.facebook.com/v20.0".to_string()
}
fn default_llm_url() -> String {
    "http://localhost:8081/api/v1/chat/ask".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[cfg(any(feature = "http-server", feature = "sentry"))]
fn default_true() -> bool {
    true
}

#[cfg(feature = "http-server")]
fn default_http_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080)
}

#[cfg(feature = "http-server")]
fn deserialize_existing_file<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path = PathBuf::deserialize(deserializer)?;
    check_existing_file(path).map_err(serde::de::Error::custom)
}

fn deserialize_existing_files<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Vec::<PathBuf>::deserialize(deserializer)?
        .into_iter()
        .map(|path| check_existing_file(path).map_err(serde::de::Error::custom))
        .collect()
}

fn check_existing_file(path: PathBuf) -> std::result::Result<PathBuf, String> {
    if !path.exists() {
        return Err(format!("File does not exist: {}", path.display()));
    }
    if !path.is_file() {
        return Err(format!("Path is not a file: {}", path.display()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.whatsapp.base_url, "https://graph.facebook.com/v20.0");
        assert_eq!(config.whatsapp.api_key, None);
        assert_eq!(config.llm.url, "http://localhost:8081/api/v1/chat/ask");
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(
            config.relay.recipient_normalization,
            NumberingPlan::ArgentinaMobile
        );

        #[cfg(feature = "http-server")]
        {
            assert!(config.http.enabled);
            assert_eq!(config.http.address.port(), 8080);
            assert!(!config.http.require_authentication);
        }
    }

    #[test]
    fn test_parse_full_file() {
        let config: AppConfig = toml::from_str(
            r#"
            [whatsapp]
            base_url = "https://graph.facebook.com/v21.0"
            api_key = "file-key"
            webhook_verify_token = "verify-me"

            [llm]
            url = "https://llm.internal/ask"
            bearer_token = "llm-token"
            timeout_secs = 15

            [relay]
            recipient_normalization = "none"

            [http]
            address = "127.0.0.1:3000"
            always_acknowledge_webhooks = true
            "#,
        )
        .unwrap();

        assert_eq!(config.whatsapp.base_url, "https://graph.facebook.com/v21.0");
        assert_eq!(config.whatsapp.api_key.as_deref(), Some("file-key"));
        assert_eq!(
            config.whatsapp.webhook_verify_token.as_deref(),
            Some("verify-me")
        );
        assert_eq!(config.llm.bearer_token.as_deref(), Some("llm-token"));
        assert_eq!(config.llm.timeout_secs, 15);
        assert_eq!(config.relay.recipient_normalization, NumberingPlan::None);

        #[cfg(feature = "http-server")]
        {
            assert_eq!(config.http.address.to_string(), "127.0.0.1:3000");
            assert!(config.http.always_acknowledge_webhooks);
        }
    }

    #[test]
    fn test_unknown_numbering_plan_is_rejected() {
        let result = toml::from_str::<AppConfig>(
            r#"
            [relay]
            recipient_normalization = "brazil"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_certificate_is_rejected() {
        let result = toml::from_str::<AppConfig>(
            r#"
            [llm]
            certificate_paths = ["/nonexistent/ca.pem"]
            "#,
        );
        let message = result.unwrap_err().to_string();
        assert!(message.contains("File does not exist"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[
                ("WHATSAPP_API_KEY", "test-whatsapp-key"),
                ("WHATSAPP_BASE_URL", "https://test.whatsapp.com"),
                ("WEBHOOK_VERIFY_TOKEN", "test-webhook-token"),
                ("LLM_URL", "https://test.llm.com/api"),
                ("LLM_BEARER_TOKEN", "test-llm-token"),
                ("SERVER_PORT", "9090"),
            ]))
            .unwrap();

        assert_eq!(config.whatsapp.api_key.as_deref(), Some("test-whatsapp-key"));
        assert_eq!(config.whatsapp.base_url, "https://test.whatsapp.com");
        assert_eq!(
            config.whatsapp.webhook_verify_token.as_deref(),
            Some("test-webhook-token")
        );
        assert_eq!(config.llm.url, "https://test.llm.com/api");
        assert_eq!(config.llm.bearer_token.as_deref(), Some("test-llm-token"));

        #[cfg(feature = "http-server")]
        assert_eq!(config.http.address.port(), 9090);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[("WHATSAPP_BASE_URL", ""), ("LLM_BEARER_TOKEN", "")]))
            .unwrap();

        assert_eq!(config.whatsapp.base_url, "https://graph.facebook.com/v20.0");
        assert_eq!(config.llm.bearer_token, None);
    }

    #[cfg(feature = "http-server")]
    #[test]
    fn test_invalid_server_port() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(env(&[("SERVER_PORT", "not-a-port")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let result = AppConfig::load(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_err());
    }
}
