//! One-stop client facade.
//!
//! [`SasClient`] wires the config, pipeline, resolver, and confirmation
//! tracker into single calls: `issue_certificate` runs the whole
//! prepare/sign/finalize flow with the configured local keys, while the
//! `prepare_*`/`finalize` passthroughs support external signers that
//! never hand their key material to this process.
//!
//! The client records the issuer key of every certificate it issues, in
//! memory, keyed by anchor outpoint. That record is what lets a delegate
//! later revoke its own certificates; anchors issued elsewhere have no
//! record and a delegate revocation of them fails closed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::audit::{AuditLogger, NoopLogger};
use crate::chain::{ChainBackend, EsploraBackend};
use crate::config::SasConfig;
use crate::confirmation::{ConfirmationStatus, ConfirmationTracker};
use crate::crypto::{PublicKey, Signature, SigningHash};
use crate::error::{Error, Result};
use crate::interpreter::{HalSimplicity, Interpreter};
use crate::models::{Certificate, Outpoint, TransactionResult, Txid, Utxo, Vault};
use crate::pipeline::{Pipeline, RevokeParams, TxState};
use crate::prepared::PreparedTransaction;
use crate::resolver::CertificateResolver;
use crate::roles::Role;
use crate::{CERT_OUTPUT_INDEX, MIN_ISSUE_SATS};

/// High-level certificate engine client.
#[derive(Debug)]
pub struct SasClient {
    config: Arc<SasConfig>,
    chain: Arc<dyn ChainBackend>,
    pipeline: Pipeline,
    resolver: CertificateResolver,
    tracker: ConfirmationTracker,
    /// Issuer key per anchor issued through this client.
    issued: Mutex<HashMap<Outpoint, PublicKey>>,
}

impl SasClient {
    /// Client over the real seams: the configured interpreter binary and
    /// the network's Esplora API. Audit events are discarded; use
    /// [`SasClient::with_parts`] to attach a logger.
    pub fn new(config: SasConfig) -> Result<Self> {
        let interpreter = Arc::new(HalSimplicity::new(&config.hal_binary));
        let chain = Arc::new(EsploraBackend::new(config.api_base_url()));
        Self::with_parts(config, interpreter, chain, Arc::new(NoopLogger))
    }

    /// Client over caller-supplied seams.
    pub fn with_parts(
        config: SasConfig,
        interpreter: Arc<dyn Interpreter>,
        chain: Arc<dyn ChainBackend>,
        audit: Arc<dyn AuditLogger>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let pipeline = Pipeline::new(config.clone(), interpreter, chain.clone(), audit);
        let resolver = CertificateResolver::new(chain.clone());
        let tracker = ConfirmationTracker::new(chain.clone());
        Ok(SasClient {
            config,
            chain,
            pipeline,
            resolver,
            tracker,
            issued: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &SasConfig {
        &self.config
    }

    /// Fresh vault snapshot: balance and unspent outputs, straight from
    /// the chain.
    pub fn vault(&self) -> Result<Vault> {
        let address = &self.config.contracts.vault.address;
        let utxos = self.chain.utxos(address)?;
        Ok(Vault::from_utxos(address.clone(), utxos))
    }

    // =========================================================================
    // One-shot flows (local signer)
    // =========================================================================

    /// Issue a certificate bound to `identifier`: pick a vault UTXO,
    /// prepare, sign with the configured key for `role`, finalize,
    /// broadcast. The new anchor is `returned_txid:1`.
    pub fn issue_certificate(&self, identifier: &[u8], role: Role) -> Result<TransactionResult> {
        let vault = self.vault()?;
        let Some(utxo) = vault.spendable_utxo().cloned() else {
            return Err(if vault.utxos.is_empty() {
                Error::VaultEmpty(vault.address)
            } else {
                Error::InsufficientFunds {
                    required: MIN_ISSUE_SATS,
                    available: vault.balance,
                }
            });
        };

        let prepared = self.pipeline.prepare_issue(&utxo, identifier, role)?;
        let signature = self.config.signing_key(role)?.sign(&prepared.signing_hash);
        let result = self.pipeline.finalize(&prepared, &signature)?;

        let anchor = Outpoint::new(result.txid, CERT_OUTPUT_INDEX);
        self.record_issuer(anchor, self.config.public_key(role));
        info!(anchor = %anchor, "Certificate issued");
        Ok(result)
    }

    /// Revoke the certificate anchored at `outpoint` by spending it.
    pub fn revoke_certificate(
        &self,
        outpoint: &Outpoint,
        params: &RevokeParams,
        role: Role,
    ) -> Result<TransactionResult> {
        let utxo = self.anchor_utxo(outpoint)?;
        let recorded = self.recorded_issuer(outpoint);
        let prepared = self
            .pipeline
            .prepare_revoke(&utxo, params, recorded.as_ref(), role)?;
        let signature = self.config.signing_key(role)?.sign(&prepared.signing_hash);
        self.pipeline.finalize(&prepared, &signature)
    }

    /// Empty the vault's first UTXO to `recipient`, admin-signed.
    pub fn drain_vault(&self, recipient: &str) -> Result<TransactionResult> {
        let vault = self.vault()?;
        let Some(utxo) = vault.utxos.first().cloned() else {
            return Err(Error::VaultEmpty(vault.address));
        };
        let prepared = self.pipeline.prepare_drain(&utxo, recipient, Role::Admin)?;
        let signature = self
            .config
            .signing_key(Role::Admin)?
            .sign(&prepared.signing_hash);
        self.pipeline.finalize(&prepared, &signature)
    }

    // =========================================================================
    // External-signer passthroughs
    // =========================================================================

    pub fn prepare_issue(
        &self,
        utxo: &Utxo,
        identifier: &[u8],
        role: Role,
    ) -> Result<PreparedTransaction> {
        self.pipeline.prepare_issue(utxo, identifier, role)
    }

    pub fn prepare_revoke(
        &self,
        utxo: &Utxo,
        params: &RevokeParams,
        role: Role,
    ) -> Result<PreparedTransaction> {
        let recorded = self.recorded_issuer(&utxo.outpoint());
        self.pipeline
            .prepare_revoke(utxo, params, recorded.as_ref(), role)
    }

    pub fn prepare_drain(
        &self,
        utxo: &Utxo,
        recipient: &str,
        role: Role,
    ) -> Result<PreparedTransaction> {
        self.pipeline.prepare_drain(utxo, recipient, role)
    }

    /// Finalize with a signature produced elsewhere.
    pub fn finalize(
        &self,
        prepared: &PreparedTransaction,
        signature: &Signature,
    ) -> Result<TransactionResult> {
        self.pipeline.finalize(prepared, signature)
    }

    /// Where a signing hash ended up, if this client broadcast it.
    pub fn transaction_state(&self, hash: &SigningHash) -> Option<TxState> {
        self.pipeline.state_of(hash)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Resolve the full certificate view at `outpoint`.
    pub fn certificate(&self, outpoint: &Outpoint) -> Result<Certificate> {
        self.resolver.resolve(outpoint)
    }

    /// Is the certificate anchored at `outpoint` currently valid?
    pub fn verify(&self, outpoint: &Outpoint) -> Result<bool> {
        Ok(self.certificate(outpoint)?.is_valid())
    }

    /// Resolve every anchor currently unspent on the certificate
    /// contract address.
    pub fn list_certificates(&self) -> Result<Vec<Certificate>> {
        let address = &self.config.contracts.certificate.address;
        self.chain
            .utxos(address)?
            .iter()
            .map(|utxo| self.resolver.resolve(&utxo.outpoint()))
            .collect()
    }

    /// Block until `txid` has at least one confirmation.
    pub fn wait_for_confirmation(&self, txid: &Txid) -> Result<ConfirmationStatus> {
        self.tracker.wait_for_confirmation(txid, 1)
    }

    /// Current confirmation state of `txid`, one probe, no waiting.
    pub fn confirmation_status(&self, txid: &Txid) -> Result<ConfirmationStatus> {
        self.tracker.status(txid)
    }

    // =========================================================================
    // Issuer records
    // =========================================================================

    fn record_issuer(&self, anchor: Outpoint, issuer: PublicKey) {
        let mut issued = self
            .issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        issued.insert(anchor, issuer);
    }

    fn recorded_issuer(&self, anchor: &Outpoint) -> Option<PublicKey> {
        let issued = self
            .issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        issued.get(anchor).copied()
    }

    /// The anchor's funding data, straight from the chain.
    fn anchor_utxo(&self, outpoint: &Outpoint) -> Result<Utxo> {
        let tx = self
            .chain
            .transaction(&outpoint.txid)?
            .ok_or_else(|| Error::UtxoNotFound(outpoint.to_string()))?;
        let output = tx
            .output(outpoint.vout)
            .ok_or_else(|| Error::UtxoNotFound(outpoint.to_string()))?;
        Ok(Utxo {
            txid: outpoint.txid,
            vout: outpoint.vout,
            value: output.value,
            asset: output.asset.clone(),
        })
    }
}
