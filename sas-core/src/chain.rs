//! Chain seam: UTXO lookup, transaction fetch, broadcast, confirmations.
//!
//! All chain state flows through the [`ChainBackend`] trait. The engine
//! persists nothing itself, so every certificate lookup is a fresh set of
//! queries against this seam. [`EsploraBackend`] is the production
//! implementation over the Blockstream Esplora REST API.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::models::{Network, Txid, Utxo};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Confirmation state of a transaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxConfirmation {
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub block_time: Option<u64>,
}

/// One output of an on-chain transaction, Esplora shape.
#[derive(Debug, Clone, Deserialize)]
pub struct TxOutput {
    /// Script pubkey, hex.
    #[serde(default)]
    pub scriptpubkey: String,
    #[serde(default)]
    pub scriptpubkey_type: String,
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
    /// Value in satoshis. Zero for annotation outputs.
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub asset: Option<String>,
}

impl TxOutput {
    pub fn is_annotation(&self) -> bool {
        self.scriptpubkey_type == "op_return"
    }
}

/// A transaction as reported by the chain backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainTransaction {
    pub txid: Txid,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
    #[serde(default)]
    pub status: TxConfirmation,
}

impl ChainTransaction {
    /// Output at `vout`, if the transaction has one.
    pub fn output(&self, vout: u32) -> Option<&TxOutput> {
        self.vout.get(vout as usize)
    }
}

/// Spend state of one specific output.
#[derive(Debug, Clone, Deserialize)]
pub struct Outspend {
    #[serde(default)]
    pub spent: bool,
    /// Spending transaction, present when spent.
    #[serde(default)]
    pub txid: Option<Txid>,
    /// Input index inside the spending transaction.
    #[serde(default)]
    pub vin: Option<u32>,
    /// Confirmation state of the spending transaction.
    #[serde(default)]
    pub status: Option<TxConfirmation>,
}

/// The only path to chain state.
///
/// `Option` in a return type means "absence is an answer": a missing
/// transaction or outspend record is data, not an error.
pub trait ChainBackend: Send + Sync + fmt::Debug {
    /// All unspent outputs currently held by an address.
    fn utxos(&self, address: &str) -> Result<Vec<Utxo>>;

    /// Fetch a transaction. `None` when the chain has never seen it.
    fn transaction(&self, txid: &Txid) -> Result<Option<ChainTransaction>>;

    /// Confirmation state of a transaction. `None` when unknown.
    fn transaction_status(&self, txid: &Txid) -> Result<Option<TxConfirmation>>;

    /// Spend state of one output. `None` when the output is unknown.
    fn outspend(&self, txid: &Txid, vout: u32) -> Result<Option<Outspend>>;

    /// Submit a raw transaction. Returns the accepted txid.
    fn broadcast(&self, raw_hex: &str) -> Result<Txid>;

    /// Current chain tip height.
    fn tip_height(&self) -> Result<u64>;
}

/// Blockstream Esplora REST client.
#[derive(Debug, Clone)]
pub struct EsploraBackend {
    base_url: String,
    client: Client,
}

impl EsploraBackend {
    /// Client against an explicit base URL (no trailing slash needed).
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        EsploraBackend {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Client against a network's public Esplora endpoint.
    pub fn for_network(network: Network) -> Self {
        Self::new(network.api_url())
    }

    /// GET a JSON resource. 404 is `Ok(None)`.
    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}/{}", self.base_url, path);
        trace!(%url, "chain GET");
        let response = self.client.get(&url).send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(Error::Api { status, message });
        }

        Ok(Some(response.json()?))
    }

    /// GET a plain-text resource.
    fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path);
        trace!(%url, "chain GET");
        let response = self.client.get(&url).send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(Error::Api { status, message });
        }

        Ok(response.text()?.trim().to_string())
    }
}

impl ChainBackend for EsploraBackend {
    fn utxos(&self, address: &str) -> Result<Vec<Utxo>> {
        Ok(self
            .get_json(&format!("address/{address}/utxo"))?
            .unwrap_or_default())
    }

    fn transaction(&self, txid: &Txid) -> Result<Option<ChainTransaction>> {
        self.get_json(&format!("tx/{txid}"))
    }

    fn transaction_status(&self, txid: &Txid) -> Result<Option<TxConfirmation>> {
        self.get_json(&format!("tx/{txid}/status"))
    }

    fn outspend(&self, txid: &Txid, vout: u32) -> Result<Option<Outspend>> {
        self.get_json(&format!("tx/{txid}/outspend/{vout}"))
    }

    fn broadcast(&self, raw_hex: &str) -> Result<Txid> {
        let url = format!("{}/tx", self.base_url);
        debug!(bytes = raw_hex.len() / 2, "broadcasting transaction");
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "text/plain")
            .body(raw_hex.to_string())
            .send()?;

        let status = response.status();
        let body = response
            .text()
            .unwrap_or_else(|_| "<no body>".to_string())
            .trim()
            .to_string();

        if !status.is_success() {
            return Err(Error::BroadcastRejected(body));
        }

        // A healthy reply is exactly the accepted txid.
        let txid = Txid::from_hex(&body)
            .map_err(|_| Error::BroadcastRejected(format!("unexpected broadcast reply: {body}")))?;
        debug!(%txid, "transaction accepted");
        Ok(txid)
    }

    fn tip_height(&self) -> Result<u64> {
        let body = self.get_text("blocks/tip/height")?;
        body.parse::<u64>()
            .map_err(|e| Error::Network(format!("invalid tip height '{body}': {e}")))
    }
}
