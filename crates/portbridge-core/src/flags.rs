//! Startup flags handed to the core once, before any port is bound

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Host capabilities found at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Features {
    pub webgl: bool,
    pub websocket: bool,
    pub online: bool,
    pub language: String,
}

impl Features {
    /// Capabilities of the native host. Sockets are always available.
    pub fn detect(config: &BridgeConfig, online: bool) -> Self {
        Self {
            webgl: config.host.webgl,
            websocket: true,
            online,
            language: config.host.language.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupFlags {
    #[serde(rename = "isWebGL")]
    pub is_webgl: bool,
    pub is_online: bool,
    pub is_web_socket: bool,
    pub api_url: String,
    pub window: [u32; 2],
    pub user_token: Option<String>,
    pub language: String,
}

impl StartupFlags {
    /// Build the flags, rejecting missing or malformed endpoints.
    pub fn assemble(
        config: &BridgeConfig,
        features: &Features,
        user_token: Option<String>,
    ) -> Result<Self> {
        let api_url = validate_endpoint("api_url", &config.endpoints.api_url, &["http", "https"])?;
        validate_endpoint("socket_url", &config.endpoints.socket_url, &["ws", "wss"])?;

        Ok(Self {
            is_webgl: features.webgl,
            is_online: features.online,
            is_web_socket: features.websocket,
            api_url: api_url.to_string(),
            window: [config.host.window_width, config.host.window_height],
            user_token,
            language: features.language.clone(),
        })
    }
}

/// Parse an endpoint and check its scheme.
pub fn validate_endpoint(field: &str, raw: &str, schemes: &[&str]) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(Error::config(format!("{} is not set", field)));
    }
    let url = Url::parse(raw).map_err(|e| Error::config(format!("{} is invalid: {}", field, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(Error::config(format!(
            "{} has scheme {}, expected one of {:?}",
            field,
            url.scheme(),
            schemes
        )));
    }
    Ok(url)
}
