//! The on-disk config record and the store that reads and rewrites it.
//!
//! The record is the only persisted state. It is read once at startup and
//! rewritten in full whenever a new gateway token is issued.

use crate::error::{Error, Result};
use serde_derive::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_CERTIFICATE_PATH: &str = "gateway.cer";
pub const DEFAULT_DISPLAY_HUB_URL: &str = "http://127.0.0.1:4444";

/// Everything needed to obtain and use a gateway token.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub gateway_host: Option<String>,
    #[serde(default)]
    pub gateway_serial_number: Option<String>,
    #[serde(default)]
    pub enphase_username: Option<String>,
    #[serde(default)]
    pub enphase_password: Option<String>,
    #[serde(default)]
    pub gateway_token: Option<String>,
}

impl Credentials {
    pub fn gateway_host(&self) -> Option<&str> {
        non_empty(&self.gateway_host)
    }

    pub fn gateway_serial_number(&self) -> Option<&str> {
        non_empty(&self.gateway_serial_number)
    }

    pub fn gateway_token(&self) -> Option<&str> {
        non_empty(&self.gateway_token)
    }

    /// Username and password, only when both are set.
    pub fn cloud_login(&self) -> Option<(&str, &str)> {
        Some((
            non_empty(&self.enphase_username)?,
            non_empty(&self.enphase_password)?,
        ))
    }
}

/// The full config file: credentials plus the display hub location.
/// Keys this crate does not know about are kept and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default = "default_display_hub_url")]
    pub yoctopuce_url: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_display_hub_url() -> String {
    DEFAULT_DISPLAY_HUB_URL.to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Reads and writes the config file at a fixed path.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `ENVOY_DISPLAY_CONFIG`, falling back to `config.json` in the
    /// working directory.
    pub fn from_env() -> Self {
        Self::new(env::var("ENVOY_DISPLAY_CONFIG").unwrap_or(DEFAULT_CONFIG_PATH.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Err(Error::Config(format!(
                "No {} file found.",
                self.path.display()
            )));
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| Error::Config(format!("Can't read {}: {e}", self.path.display())))?;
        let config = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("Can't parse {}: {e}", self.path.display())))?;
        debug!("Loaded config from {}", self.path.display());
        Ok(config)
    }

    /// Rewrites the whole file, 4-space indented.
    pub fn save(&self, config: &Config) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        serde::Serialize::serialize(config, &mut serializer)
            .map_err(|e| Error::Config(format!("Can't serialise config: {e}")))?;
        fs::write(&self.path, buf)
            .map_err(|e| Error::Config(format!("Can't write {}: {e}", self.path.display())))?;
        info!("Saved refreshed gateway token to {}", self.path.display());
        Ok(())
    }
}

/// Certificate location from `ENVOY_DISPLAY_CERT`, defaulting to `gateway.cer`.
pub fn certificate_path_from_env() -> PathBuf {
    env::var("ENVOY_DISPLAY_CERT")
        .unwrap_or(DEFAULT_CERTIFICATE_PATH.to_string())
        .into()
}
