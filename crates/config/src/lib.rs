use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "ebms-connector";
const KEYCHAIN_SERVICE: &str = "ebms.gateway.credentials";

/// Keychain entry names for the gateway account.
pub const USERNAME_KEY: &str = "api_username";
pub const PASSWORD_KEY: &str = "api_password";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbmsConfig {
    #[serde(default)]
    pub endpoints: EndpointConfig,
    /// System/device identifier registered with the authority.
    pub device_id: Option<String>,
    /// Authority public key (PEM) for signature verification.
    pub public_key_pem: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_audit_log")]
    pub audit_log: String,
}

impl Default for EbmsConfig {
    fn default() -> Self {
        Self {
            endpoints: EndpointConfig::default(),
            device_id: None,
            public_key_pem: None,
            timeout_secs: default_timeout_secs(),
            audit_log: default_audit_log(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub api_url: Option<String>,
    pub login_url: Option<String>,
    pub cancel_url: Option<String>,
    pub nif_check_url: Option<String>,
    pub get_invoice_url: Option<String>,
    pub stock_url: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_audit_log() -> String {
    "ebms_audit.jsonl".to_string()
}

pub fn load() -> Result<EbmsConfig> {
    let cfg: EbmsConfig = confy::load(APP_NAME, None).context("Failed to load EBMS config")?;
    Ok(cfg)
}

pub fn store(cfg: &EbmsConfig) -> Result<()> {
    confy::store(APP_NAME, None, cfg).context("Failed to store EBMS config")?;
    Ok(())
}

/// Store a secret in the OS keychain
pub fn store_secret(key: &str, value: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.set_password(value)?;
    Ok(())
}

/// Retrieve a secret from the OS keychain
pub fn get_secret(key: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    let password = entry.get_password()?;
    Ok(password)
}

/// Delete a secret from the OS keychain
pub fn delete_secret(key: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.delete_password()?;
    Ok(())
}

/// Both halves of the gateway account, from the keychain.
pub fn gateway_credentials() -> Result<(String, String)> {
    let username = get_secret(USERNAME_KEY).context("gateway username is not stored")?;
    let password = get_secret(PASSWORD_KEY).context("gateway password is not stored")?;
    Ok((username, password))
}
