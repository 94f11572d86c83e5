use anyhow::Context;
use std::path::Path;
use tracing::{debug, info, warn};

pub const DEFAULT_GATEWAY_HOST: &str = "envoy.local";

/// Creates clients bound to one gateway host.
#[allow(async_fn_in_trait)]
pub trait GatewayConnector {
    type Client: GatewayApi;

    /// Downloads the certificate the gateway presents and stores it at
    /// `cert_path`.
    async fn trust_gateway(&self, cert_path: &Path) -> anyhow::Result<()>;

    /// Builds a client for the gateway, trusting `cert_path` if it exists.
    fn connect(&self, cert_path: &Path) -> anyhow::Result<Self::Client>;
}

/// A client talking to the gateway's local API.
#[allow(async_fn_in_trait)]
pub trait GatewayApi {
    /// Presents the token to the gateway. `Ok(false)` means it was refused.
    async fn login(&mut self, token: &str) -> anyhow::Result<bool>;

    async fn api_call(&self, path: &str) -> anyhow::Result<serde_json::Value>;
}

/// An IQ Gateway reachable on the local network.
#[derive(Debug, Clone)]
pub struct Gateway {
    base_url: String,
}

impl Gateway {
    /// `host` may be a bare hostname (HTTPS is assumed) or a full base URL.
    /// `None` uses the gateway's mDNS name.
    pub fn new(host: Option<&str>) -> Self {
        let host = host.unwrap_or(DEFAULT_GATEWAY_HOST);
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{host}")
        };
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl GatewayConnector for Gateway {
    type Client = GatewayClient;

    async fn trust_gateway(&self, cert_path: &Path) -> anyhow::Result<()> {
        // The gateway uses a self-signed certificate, so the first connection
        // accepts anything and records what it was shown.
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .tls_info(true)
            .build()?;
        let response = client
            .get(format!("{}/info", self.base_url))
            .send()
            .await
            .with_context(|| format!("Can't reach gateway at {}", self.base_url))?;
        let certificate = response
            .extensions()
            .get::<reqwest::tls::TlsInfo>()
            .and_then(|info| info.peer_certificate())
            .with_context(|| format!("Gateway at {} presented no certificate", self.base_url))?
            .to_vec();

        tokio::fs::write(cert_path, certificate)
            .await
            .with_context(|| format!("Can't write {}", cert_path.display()))?;
        info!(
            "Stored certificate for {} in {}",
            self.base_url,
            cert_path.display()
        );
        Ok(())
    }

    fn connect(&self, cert_path: &Path) -> anyhow::Result<GatewayClient> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if self.base_url.starts_with("https://") && cert_path.exists() {
            match std::fs::read(cert_path)
                .map_err(anyhow::Error::from)
                .and_then(|der| Ok(reqwest::Certificate::from_der(&der)?))
            {
                // The certificate is issued for the gateway's serial, not the
                // name or address it is reached by.
                Ok(certificate) => {
                    builder = builder
                        .add_root_certificate(certificate)
                        .danger_accept_invalid_hostnames(true);
                }
                Err(e) => warn!(
                    "Ignoring unusable certificate {}: {e:#}",
                    cert_path.display()
                ),
            }
        }
        Ok(GatewayClient {
            base_url: self.base_url.clone(),
            client: builder.build()?,
            token: None,
        })
    }
}

pub struct GatewayClient {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

impl GatewayApi for GatewayClient {
    async fn login(&mut self, token: &str) -> anyhow::Result<bool> {
        let response = self
            .client
            .get(format!("{}/auth/check_jwt", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let accepted = status.is_success() && body.contains("Valid token");
        debug!("Gateway login returned {status}, accepted: {accepted}");
        if accepted {
            self.token = Some(token.to_string());
        }
        Ok(accepted)
    }

    async fn api_call(&self, path: &str) -> anyhow::Result<serde_json::Value> {
        let mut request = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let result = request
            .send()
            .await
            .with_context(|| format!("GET {path}"))?
            .error_for_status()
            .with_context(|| format!("GET {path}"))?
            .json()
            .await
            .with_context(|| format!("GET {path}"))?;
        Ok(result)
    }
}
