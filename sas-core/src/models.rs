//! Core domain types.
//!
//! Everything here is either a chain-native identifier (txid, outpoint) or a
//! derived view over chain state (utxo, vault, certificate). None of it is
//! persisted: certificates in particular are recomputed from the chain on
//! every lookup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::MIN_ISSUE_SATS;

/// Transaction id, held in display order (as chain APIs render it).
///
/// The annotation wire format carries exactly these 32 bytes. No byte-order
/// flip happens anywhere in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Txid([u8; 32]);

impl Txid {
    /// Parse from a 64-char hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 64 {
            return Err(Error::InvalidTxid(format!(
                "expected 64 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| Error::InvalidTxid(e.to_string()))?;
        Ok(Txid(bytes))
    }

    /// Wrap raw bytes already in display order.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Txid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Txid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Txid::from_hex(s)
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Txid::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A specific output of a specific transaction. The anchor of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outpoint {
    pub txid: Txid,
    pub vout: u32,
}

impl Outpoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Outpoint { txid, vout }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl FromStr for Outpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (txid, vout) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidOutpoint(format!("missing ':' in '{s}'")))?;
        let txid = Txid::from_hex(txid)?;
        let vout = vout
            .parse::<u32>()
            .map_err(|e| Error::InvalidOutpoint(format!("bad vout in '{s}': {e}")))?;
        Ok(Outpoint { txid, vout })
    }
}

/// An unspent output as reported by the chain backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    /// Value in satoshis.
    pub value: u64,
    /// Asset id, present on asset-aware chains.
    #[serde(default)]
    pub asset: Option<String>,
}

impl Utxo {
    pub fn outpoint(&self) -> Outpoint {
        Outpoint::new(self.txid, self.vout)
    }
}

/// Derived view of the issuing vault: its address and what it currently holds.
#[derive(Debug, Clone, Serialize)]
pub struct Vault {
    pub address: String,
    /// Sum of utxo values, in satoshis.
    pub balance: u64,
    pub utxos: Vec<Utxo>,
}

impl Vault {
    pub fn from_utxos(address: impl Into<String>, utxos: Vec<Utxo>) -> Self {
        let balance = utxos.iter().map(|u| u.value).sum();
        Vault {
            address: address.into(),
            balance,
            utxos,
        }
    }

    /// Whether the vault can fund at least one issuance.
    ///
    /// An issuance needs the certificate output, the fee, and a change
    /// output that stays at or above dust, all from a single utxo.
    pub fn can_issue(&self) -> bool {
        self.balance >= MIN_ISSUE_SATS && self.spendable_utxo().is_some()
    }

    /// First utxo large enough to fund an issuance on its own.
    pub fn spendable_utxo(&self) -> Option<&Utxo> {
        self.utxos.iter().find(|u| u.value >= MIN_ISSUE_SATS)
    }
}

/// Lifecycle state of a certificate, derived from its anchor outpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    /// Anchor outpoint exists and is unspent.
    Valid,
    /// Anchor outpoint has been spent. Spend is authoritative even without
    /// a decodable revocation annotation.
    Revoked,
    /// Anchor outpoint cannot be located. A result, not an error.
    Unknown,
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CertificateStatus::Valid => "valid",
            CertificateStatus::Revoked => "revoked",
            CertificateStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A certificate, recomputed from chain state on demand.
#[derive(Debug, Clone, Serialize)]
pub struct Certificate {
    pub outpoint: Outpoint,
    /// Identifier from the issuing annotation: UTF-8 when the bytes are
    /// valid UTF-8, lowercase hex otherwise. None when the issuing
    /// transaction carries no decodable annotation.
    pub cid: Option<String>,
    pub status: CertificateStatus,
    /// Anchor output value in satoshis.
    pub value: u64,
    /// Confirmation height of the issuing transaction.
    pub issued_at: Option<u64>,
    /// Confirmation height of the spending transaction, when revoked.
    pub revoked_at: Option<u64>,
    /// Reason code from the revocation annotation, when present.
    pub reason_code: Option<u8>,
    /// Successor certificate named by the revocation annotation.
    pub replacement: Option<Outpoint>,
}

impl Certificate {
    /// The resolver's answer for an outpoint it cannot locate.
    pub fn unknown(outpoint: Outpoint) -> Self {
        Certificate {
            outpoint,
            cid: None,
            status: CertificateStatus::Unknown,
            value: 0,
            issued_at: None,
            revoked_at: None,
            reason_code: None,
            replacement: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == CertificateStatus::Valid
    }

    /// Registry name for the revocation reason, when one is registered.
    pub fn reason_name(&self) -> Option<&'static str> {
        self.reason_code.and_then(crate::protocol::reason_name)
    }
}

/// Outcome of a successful finalize: the transaction is on the network.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResult {
    pub txid: Txid,
    pub raw_hex: String,
}

impl TransactionResult {
    /// Block explorer link for the broadcast transaction.
    pub fn explorer_url(&self, network: Network) -> String {
        format!("{}/tx/{}", network.explorer_url(), self.txid)
    }
}

/// Which chain the engine talks to. Selects asset id and API endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    #[serde(alias = "liquidtestnet")]
    Testnet,
    #[serde(alias = "liquid")]
    Mainnet,
}

impl Network {
    /// The network's native asset id (L-BTC).
    pub fn default_asset_id(&self) -> &'static str {
        match self {
            Network::Testnet => "144c654344aa716d6f3abcc1ca90e5641e4e2a7f633bc09fe3baf64585819a49",
            Network::Mainnet => "6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d",
        }
    }

    /// Esplora REST base URL.
    pub fn api_url(&self) -> &'static str {
        match self {
            Network::Testnet => "https://blockstream.info/liquidtestnet/api",
            Network::Mainnet => "https://blockstream.info/liquid/api",
        }
    }

    /// Block explorer base URL.
    pub fn explorer_url(&self) -> &'static str {
        match self {
            Network::Testnet => "https://blockstream.info/liquidtestnet",
            Network::Mainnet => "https://blockstream.info/liquid",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Testnet => "liquidtestnet",
            Network::Mainnet => "liquid",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID_A: &str = "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16";

    #[test]
    fn test_txid_hex_roundtrip() {
        let txid = Txid::from_hex(TXID_A).unwrap();
        assert_eq!(txid.to_hex(), TXID_A);
        assert_eq!(txid.to_string(), TXID_A);
    }

    #[test]
    fn test_txid_rejects_bad_input() {
        match Txid::from_hex("abcd") {
            Err(Error::InvalidTxid(_)) => {}
            res => panic!("Expected InvalidTxid, got {:?}", res),
        }
        let not_hex = "zz".repeat(32);
        match Txid::from_hex(&not_hex) {
            Err(Error::InvalidTxid(_)) => {}
            res => panic!("Expected InvalidTxid, got {:?}", res),
        }
    }

    #[test]
    fn test_outpoint_display_and_parse() {
        let outpoint = Outpoint::new(Txid::from_hex(TXID_A).unwrap(), 1);
        let rendered = outpoint.to_string();
        assert_eq!(rendered, format!("{TXID_A}:1"));
        let parsed: Outpoint = rendered.parse().unwrap();
        assert_eq!(parsed, outpoint);
    }

    #[test]
    fn test_outpoint_parse_rejects_malformed() {
        match TXID_A.parse::<Outpoint>() {
            Err(Error::InvalidOutpoint(_)) => {}
            res => panic!("Expected InvalidOutpoint, got {:?}", res),
        }
        match format!("{TXID_A}:x").parse::<Outpoint>() {
            Err(Error::InvalidOutpoint(_)) => {}
            res => panic!("Expected InvalidOutpoint, got {:?}", res),
        }
    }

    #[test]
    fn test_txid_serde_as_hex_string() {
        let txid = Txid::from_hex(TXID_A).unwrap();
        let json = serde_json::to_string(&txid).unwrap();
        assert_eq!(json, format!("\"{TXID_A}\""));
        let back: Txid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, txid);
    }

    #[test]
    fn test_vault_issue_threshold() {
        let txid = Txid::from_hex(TXID_A).unwrap();
        let utxo = |value| Utxo {
            txid,
            vout: 0,
            value,
            asset: None,
        };

        // 1591 sats would leave change below dust.
        let vault = Vault::from_utxos("tex1q...", vec![utxo(MIN_ISSUE_SATS - 1)]);
        assert!(!vault.can_issue());

        let vault = Vault::from_utxos("tex1q...", vec![utxo(MIN_ISSUE_SATS)]);
        assert!(vault.can_issue());

        // Balance large enough in aggregate but no single utxo qualifies.
        let vault = Vault::from_utxos("tex1q...", vec![utxo(1000), utxo(1000)]);
        assert!(!vault.can_issue());
    }

    #[test]
    fn test_network_presets() {
        assert_eq!(
            Network::Testnet.api_url(),
            "https://blockstream.info/liquidtestnet/api"
        );
        assert!(Network::Mainnet.default_asset_id().starts_with("6f0279e9"));
        assert_eq!(Network::default(), Network::Testnet);
    }

    #[test]
    fn test_network_accepts_chain_aliases() {
        let net: Network = serde_json::from_str("\"liquidtestnet\"").unwrap();
        assert_eq!(net, Network::Testnet);
        let net: Network = serde_json::from_str("\"liquid\"").unwrap();
        assert_eq!(net, Network::Mainnet);
    }
}
