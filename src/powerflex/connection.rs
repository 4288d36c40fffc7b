//! Gateway HTTP Connection
//!
//! This module owns the HTTPS client used to talk to the PowerFlex gateway:
//! TLS setup (custom CA bundle or insecure mode), login, and the typed
//! GET/POST helpers every API call goes through.
//!
//! The gateway authenticates with HTTP basic auth. Login uses
//! `username:password` and returns a session token; every later request uses
//! `username:token`.

use crate::config::PowerFlexConfig;
use crate::error::{ExporterError, Result};
use crate::token::Authenticator;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Error body returned by the gateway on non-2xx responses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

/// HTTPS connection to the PowerFlex gateway
pub struct GatewayConnection {
    config: Arc<PowerFlexConfig>,
    http: reqwest::Client,
}

impl GatewayConnection {
    pub fn new(config: Arc<PowerFlexConfig>) -> Result<Self> {
        let mut tls = native_tls::TlsConnector::builder();

        if config.insecure {
            warn!("Gateway certificate verification is disabled");
            tls.danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        } else if let Some(path) = &config.cert_path {
            let pem = std::fs::read(path)?;
            let cert = native_tls::Certificate::from_pem(&pem)
                .map_err(|e| ExporterError::Config(format!("Invalid certificate {}: {}", path, e)))?;
            tls.add_root_certificate(cert);
            info!("Using gateway CA bundle from {}", path);
        }

        let connector = tls
            .build()
            .map_err(|e| ExporterError::Config(e.to_string()))?;

        let http = reqwest::Client::builder()
            .use_preconfigured_tls(connector)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { config, http })
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    /// GET a JSON document, authenticated with the session token
    pub async fn get_json<T>(&self, path: &str, token: &SecretString) -> Result<T>
    where
        T: DeserializeOwned,
    {
        debug!("GET {}", path);
        let response = self
            .http
            .get(self.url(path))
            .basic_auth(&self.config.username, Some(token.expose_secret()))
            .send()
            .await?;
        Self::decode(path, response).await
    }

    /// POST a JSON body and decode the JSON reply
    pub async fn post_json<B, T>(&self, path: &str, body: &B, token: &SecretString) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("POST {}", path);
        let response = self
            .http
            .post(self.url(path))
            .basic_auth(&self.config.username, Some(token.expose_secret()))
            .json(body)
            .send()
            .await?;
        Self::decode(path, response).await
    }

    async fn decode<T>(path: &str, response: reqwest::Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ExporterError::Auth(format!(
                "{} rejected the session token",
                path
            )));
        }

        if !status.is_success() {
            let reason = serde_json::from_str::<GatewayErrorBody>(&body)
                .ok()
                .and_then(|e| {
                    e.message
                        .map(|m| format!("{} (code {})", m, e.error_code.unwrap_or_default()))
                })
                .unwrap_or_else(|| body.clone());
            return Err(ExporterError::PowerFlexApi(format!(
                "{} returned {}: {}",
                path, status, reason
            )));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl Authenticator for GatewayConnection {
    async fn login(&self) -> Result<SecretString> {
        let response = self
            .http
            .get(self.url("/api/login"))
            .basic_auth(
                &self.config.username,
                Some(self.config.password.expose_secret()),
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExporterError::Auth(format!(
                "gateway login returned {}",
                status
            )));
        }

        // The token comes back as a bare JSON string
        let token: String = serde_json::from_str(&response.text().await?)?;
        if token.is_empty() {
            return Err(ExporterError::Auth(
                "gateway returned an empty token".to_string(),
            ));
        }
        Ok(SecretString::from(token))
    }
}
