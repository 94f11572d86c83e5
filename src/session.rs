//! Turning stored credentials into a logged-in gateway client.

use crate::config::Credentials;
use crate::enphase_cloud::CloudAuthenticator;
use crate::error::{Error, Result};
use crate::gateway::{GatewayApi, GatewayConnector};
use std::path::Path;
use tracing::{info, warn};

/// Establishes an authenticated session with the gateway.
///
/// A cached token is reused while it is valid. Otherwise a new one is
/// requested from the cloud with the stored username and password, and
/// `persist` is called with the updated credentials; it is not called on any
/// other path. The gateway certificate is fetched into `cert_path` the first
/// time only. Nothing is retried: the first failure aborts.
pub async fn establish_session<A, G, P>(
    credentials: &mut Credentials,
    authenticator: &mut A,
    gateway: &G,
    cert_path: &Path,
    persist: P,
) -> Result<G::Client>
where
    A: CloudAuthenticator,
    G: GatewayConnector,
    P: FnOnce(&Credentials) -> Result<()>,
{
    if let Some(token) = credentials.gateway_token() {
        if !authenticator.check_token_valid(token, credentials.gateway_serial_number()) {
            warn!("Cached gateway token is expired or for another gateway, discarding it");
            credentials.gateway_token = None;
        }
    }

    if credentials.gateway_token().is_none() {
        let token = issue_token(credentials, authenticator).await?;
        credentials.gateway_token = Some(token);
        persist(&*credentials)?;
    }

    if !cert_path.exists() {
        gateway
            .trust_gateway(cert_path)
            .await
            .map_err(|e| Error::auth(format!("unable to trust gateway: {e:#}")))?;
    }

    let mut client = gateway
        .connect(cert_path)
        .map_err(|e| Error::auth(format!("unable to create gateway client: {e:#}")))?;
    let token = credentials.gateway_token().unwrap_or_default();
    let accepted = client
        .login(token)
        .await
        .map_err(|e| Error::auth(format!("login failed: {e:#}")))?;
    if !accepted {
        return Err(Error::auth("login failed"));
    }
    info!("Logged in to gateway");
    Ok(client)
}

async fn issue_token<A: CloudAuthenticator>(
    credentials: &Credentials,
    authenticator: &mut A,
) -> Result<String> {
    let Some((username, password)) = credentials.cloud_login() else {
        return Err(Error::auth("missing credentials"));
    };

    let authenticated = authenticator
        .authenticate(username, password)
        .await
        .map_err(|e| Error::auth(format!("login rejected: {e:#}")))?;
    if !authenticated {
        return Err(Error::auth("login rejected"));
    }

    let token = match credentials.gateway_serial_number() {
        Some(serial) => {
            info!("Requesting token for gateway {serial}");
            authenticator
                .get_token_for_commissioned_gateway(serial)
                .await
        }
        None => {
            info!("Requesting token for uncommissioned gateways");
            authenticator.get_token_for_uncommissioned_gateway().await
        }
    };
    token.map_err(|e| Error::auth(format!("token issuance failed: {e:#}")))
}
