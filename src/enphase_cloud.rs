use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_derive::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

pub const ENLIGHTEN_URL: &str = "https://enlighten.enphaseenergy.com";
pub const ENTREZ_URL: &str = "https://entrez.enphaseenergy.com";

/// What session establishment needs from the vendor cloud.
#[allow(async_fn_in_trait)]
pub trait CloudAuthenticator {
    /// Whether a cached token can still be presented to the gateway.
    fn check_token_valid(&self, token: &str, gateway_serial_number: Option<&str>) -> bool;

    /// Logs in with the owner/installer account. `Ok(false)` means the
    /// service answered but rejected the credentials.
    async fn authenticate(&mut self, username: &str, password: &str) -> anyhow::Result<bool>;

    async fn get_token_for_commissioned_gateway(
        &mut self,
        gateway_serial_number: &str,
    ) -> anyhow::Result<String>;

    async fn get_token_for_uncommissioned_gateway(&mut self) -> anyhow::Result<String>;
}

/// Enlighten login plus Entrez token issuance over HTTPS.
pub struct EnphaseAuthentication {
    enlighten_url: String,
    entrez_url: String,
    client: reqwest::Client,
    session: Option<CloudSession>,
}

struct CloudSession {
    session_id: String,
    username: String,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[allow(dead_code)]
    exp: u64,
}

impl Default for EnphaseAuthentication {
    fn default() -> Self {
        Self::new()
    }
}

impl EnphaseAuthentication {
    pub fn new() -> Self {
        Self::with_endpoints(ENLIGHTEN_URL, ENTREZ_URL)
    }

    pub fn with_endpoints(enlighten_url: impl Into<String>, entrez_url: impl Into<String>) -> Self {
        Self {
            enlighten_url: enlighten_url.into(),
            entrez_url: entrez_url.into(),
            client: reqwest::Client::new(),
            session: None,
        }
    }

    async fn request_token(&self, body: serde_json::Value) -> anyhow::Result<String> {
        let Some(session) = &self.session else {
            anyhow::bail!("Not authenticated with Enlighten");
        };
        let mut body = body;
        body["session_id"] = json!(session.session_id);
        body["username"] = json!(session.username);

        let token = self
            .client
            .post(format!("{}/tokens", self.entrez_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let token = token.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("Entrez returned an empty token");
        }
        Ok(token)
    }
}

impl CloudAuthenticator for EnphaseAuthentication {
    fn check_token_valid(&self, token: &str, gateway_serial_number: Option<&str>) -> bool {
        token_is_valid(token, gateway_serial_number)
    }

    async fn authenticate(&mut self, username: &str, password: &str) -> anyhow::Result<bool> {
        let response = self
            .client
            .post(format!("{}/login/login.json", self.enlighten_url))
            .form(&[("user[email]", username), ("user[password]", password)])
            .send()
            .await?;
        if response.status().is_client_error() {
            warn!("Enlighten rejected login with status {}", response.status());
            return Ok(false);
        }
        let login: LoginResponse = response.error_for_status()?.json().await?;

        match login.session_id {
            Some(session_id) if login.message == "success" => {
                debug!("Logged in to Enlighten as {username}");
                self.session = Some(CloudSession {
                    session_id,
                    username: username.to_string(),
                });
                Ok(true)
            }
            _ => {
                warn!("Enlighten login failed: {}", login.message);
                Ok(false)
            }
        }
    }

    async fn get_token_for_commissioned_gateway(
        &mut self,
        gateway_serial_number: &str,
    ) -> anyhow::Result<String> {
        self.request_token(json!({ "serial_num": gateway_serial_number }))
            .await
    }

    async fn get_token_for_uncommissioned_gateway(&mut self) -> anyhow::Result<String> {
        self.request_token(json!({ "uncommissioned": true })).await
    }
}

/// Checks the token's claims locally: it must not be expired and, when a
/// serial number is given, must be issued for that gateway.
///
/// The signature is not verified here. A token with valid claims that Entrez
/// did not sign passes this check and is then refused by the gateway at
/// login, which ends session establishment with "login failed" rather than
/// triggering a fresh token request.
pub fn token_is_valid(token: &str, gateway_serial_number: Option<&str>) -> bool {
    let mut validation = Validation::new(Algorithm::ES256);
    validation.insecure_disable_signature_validation();
    match gateway_serial_number {
        Some(serial) => validation.set_audience(&[serial]),
        None => validation.validate_aud = false,
    }

    match jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(_) => true,
        Err(e) => {
            debug!("Cached gateway token rejected: {e}");
            false
        }
    }
}
