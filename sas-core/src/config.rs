//! Engine configuration.
//!
//! Everything the engine needs arrives in one explicit [`SasConfig`] value
//! threaded through constructors. There are no ambient globals and no
//! environment lookups.
//!
//! # Configuration File Format
//!
//! ```json
//! {
//!   "network": "liquidtestnet",
//!   "keys": {
//!     "admin":    { "name": "ops", "private_key": "<hex>", "public_key": "<hex>" },
//!     "delegate": { "name": "issuer-1", "private_key": "<hex>", "public_key": "<hex>" }
//!   },
//!   "contracts": {
//!     "vault": {
//!       "address": "tex1p...",
//!       "cmr": "<hex>",
//!       "script_pubkey": "<hex>",
//!       "program": "<base64>"
//!     },
//!     "certificate": { "...": "..." }
//!   },
//!   "taproot": { "internal_key": "<hex>" },
//!   "hal_binary": "hal-simplicity"
//! }
//! ```
//!
//! `network`, `asset_id`, `taproot.internal_key`, `hal_binary`, and
//! `api_base_url` all have working defaults; keys and contracts do not.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::crypto::{PublicKey, SigningKey};
use crate::error::{Error, Result};
use crate::models::Network;
use crate::roles::Role;
use crate::DEFAULT_INTERNAL_KEY;

/// Full engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SasConfig {
    #[serde(default)]
    pub network: Network,
    /// Asset id for every output. Defaults to the network's native asset.
    #[serde(default)]
    pub asset_id: Option<String>,
    pub keys: RoleKeys,
    pub contracts: Contracts,
    #[serde(default)]
    pub taproot: TaprootConfig,
    /// Interpreter CLI binary, resolved through PATH when not absolute.
    #[serde(default = "default_hal_binary")]
    pub hal_binary: PathBuf,
    /// Esplora base URL override. Defaults to the network's public endpoint.
    #[serde(default)]
    pub api_base_url: Option<String>,
}

/// Signing material per role.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleKeys {
    pub admin: KeyEntry,
    pub delegate: KeyEntry,
}

/// One role's key material. The private key stays redacted in Debug output.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyEntry {
    #[serde(default)]
    pub name: String,
    pub private_key: SecretString,
    pub public_key: PublicKey,
}

/// Compiled covenant artifacts for one contract.
#[derive(Debug, Clone, Deserialize)]
pub struct Contracts {
    pub vault: ContractInfo,
    pub certificate: ContractInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractInfo {
    /// Confidential or unconfidential address of the contract.
    pub address: String,
    /// Commitment Merkle root, hex.
    pub cmr: String,
    /// Script pubkey of the contract output, hex.
    pub script_pubkey: String,
    /// Compiled program, base64, as the interpreter expects it.
    pub program: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaprootConfig {
    /// Unspendable (NUMS) internal key for script-path-only outputs.
    #[serde(default = "default_internal_key")]
    pub internal_key: String,
}

impl Default for TaprootConfig {
    fn default() -> Self {
        TaprootConfig {
            internal_key: default_internal_key(),
        }
    }
}

fn default_internal_key() -> String {
    DEFAULT_INTERNAL_KEY.to_string()
}

fn default_hal_binary() -> PathBuf {
    PathBuf::from("hal-simplicity")
}

impl SasConfig {
    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SasConfig =
            serde_json::from_str(json).map_err(|e| Error::ConfigurationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file (typically `secrets.json`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigurationError(format!(
                "failed to read {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Check internal consistency. Runs automatically on load.
    ///
    /// Each role's stated public key must be the one its private key
    /// derives; a mismatch here would otherwise surface much later as an
    /// on-chain covenant failure.
    pub fn validate(&self) -> Result<()> {
        for role in [Role::Admin, Role::Delegate] {
            let entry = self.key(role);
            let derived = self.signing_key(role)?.public_key();
            if derived != entry.public_key {
                return Err(Error::ConfigurationError(format!(
                    "{role} public key does not match its private key"
                )));
            }
        }
        if self.taproot.internal_key.len() != 64
            || hex::decode(&self.taproot.internal_key).is_err()
        {
            return Err(Error::ConfigurationError(
                "taproot.internal_key must be 64 hex chars".to_string(),
            ));
        }
        Ok(())
    }

    /// Key material for a role.
    pub fn key(&self, role: Role) -> &KeyEntry {
        match role {
            Role::Admin => &self.keys.admin,
            Role::Delegate => &self.keys.delegate,
        }
    }

    /// Construct the signing key for a role.
    pub fn signing_key(&self, role: Role) -> Result<SigningKey> {
        SigningKey::from_hex(self.key(role).private_key.expose_secret())
    }

    /// Stated public key for a role.
    pub fn public_key(&self, role: Role) -> PublicKey {
        self.key(role).public_key
    }

    /// Asset id, falling back to the network's native asset.
    pub fn asset_id(&self) -> &str {
        self.asset_id
            .as_deref()
            .unwrap_or_else(|| self.network.default_asset_id())
    }

    /// Esplora base URL, falling back to the network's public endpoint.
    pub fn api_base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or_else(|| self.network.api_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config_json() -> String {
        let admin = SigningKey::from_hex(&"11".repeat(32)).unwrap();
        let delegate = SigningKey::from_hex(&"22".repeat(32)).unwrap();
        format!(
            r#"{{
              "keys": {{
                "admin": {{
                  "name": "ops",
                  "private_key": "{}",
                  "public_key": "{}"
                }},
                "delegate": {{
                  "name": "issuer-1",
                  "private_key": "{}",
                  "public_key": "{}"
                }}
              }},
              "contracts": {{
                "vault": {{
                  "address": "tex1pvault",
                  "cmr": "aa",
                  "script_pubkey": "bb",
                  "program": "cHJvZ3JhbQ=="
                }},
                "certificate": {{
                  "address": "tex1pcert",
                  "cmr": "cc",
                  "script_pubkey": "dd",
                  "program": "Y2VydA=="
                }}
              }}
            }}"#,
            "11".repeat(32),
            admin.public_key().to_hex(),
            "22".repeat(32),
            delegate.public_key().to_hex(),
        )
    }

    #[test]
    fn test_defaults_applied() {
        let config = SasConfig::from_json(&sample_config_json()).unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.asset_id(), Network::Testnet.default_asset_id());
        assert_eq!(config.api_base_url(), Network::Testnet.api_url());
        assert_eq!(config.taproot.internal_key, DEFAULT_INTERNAL_KEY);
        assert_eq!(config.hal_binary, PathBuf::from("hal-simplicity"));
    }

    #[test]
    fn test_role_key_lookup() {
        let config = SasConfig::from_json(&sample_config_json()).unwrap();
        assert_eq!(config.key(Role::Admin).name, "ops");
        assert_eq!(config.key(Role::Delegate).name, "issuer-1");
        let signer = config.signing_key(Role::Admin).unwrap();
        assert_eq!(signer.public_key(), config.public_key(Role::Admin));
    }

    #[test]
    fn test_mismatched_keypair_is_rejected() {
        let mismatched =
            sample_config_json().replacen(&"11".repeat(32), &"33".repeat(32), 1);
        match SasConfig::from_json(&mismatched) {
            Err(Error::ConfigurationError(msg)) => {
                assert!(msg.contains("public key"));
            }
            res => panic!("Expected ConfigurationError, got {:?}", res),
        }
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        match SasConfig::from_file("/nonexistent/secrets.json") {
            Err(Error::ConfigurationError(msg)) => {
                assert!(msg.contains("/nonexistent/secrets.json"));
            }
            res => panic!("Expected ConfigurationError, got {:?}", res),
        }
    }

    #[test]
    fn test_debug_redacts_private_keys() {
        let config = SasConfig::from_json(&sample_config_json()).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains(&"11".repeat(32)));
        assert!(!debug.contains(&"22".repeat(32)));
    }
}
