//! Prepare/sign/finalize pipeline.
//!
//! Transactions move through an explicit state machine:
//!
//! ```text
//! Requested -> Prepared -> Signed -> Finalized -> Broadcast -> Confirmed
//!                                                           \-> Rejected
//! ```
//!
//! with `Expired` reachable from every non-terminal state once the
//! prepared transaction's TTL lapses. The engine itself keeps no
//! per-transaction session: a prepare call hands the caller an immutable
//! [`PreparedTransaction`], and the only engine-side memory is the
//! idempotency ledger keyed by signing hash. Once a finalize reaches a
//! terminal broadcast outcome (accepted or rejected by the chain), every
//! repeat call for the same hash replays that outcome without touching
//! the interpreter or the network, so a transaction is broadcast at most
//! once no matter how often a flaky caller retries.
//!
//! The ledger lock covers map access only. No lock is held across an
//! interpreter or chain call.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditLogger};
use crate::chain::ChainBackend;
use crate::config::{ContractInfo, SasConfig};
use crate::crypto::{PublicKey, Signature, SigningHash};
use crate::error::{Error, Result};
use crate::interpreter::{InputBinding, Interpreter, PlannedOutput};
use crate::models::{Outpoint, TransactionResult, Txid, Utxo};
use crate::prepared::{PreparedTransaction, TransactionKind, DEFAULT_TTL_SECS};
use crate::protocol::{identifier_text, SasPayload};
use crate::roles::{authorize, authorize_revoke, Permission, Role};
use crate::witness::SpendingPath;
use crate::{CERT_DUST_SATS, CERT_OUTPUT_INDEX, FEE_SATS, MIN_ISSUE_SATS};

/// Lifecycle position of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    /// Asked for, nothing assembled yet.
    Requested,
    /// Skeleton built, digest extracted, awaiting a signature.
    Prepared,
    /// A signature exists for the digest.
    Signed,
    /// Witness attached and covenant-checked.
    Finalized,
    /// Accepted into the network's mempool.
    Broadcast,
    /// Buried under at least one block.
    Confirmed,
    /// The chain refused the transaction. Terminal for this skeleton.
    Rejected,
    /// TTL lapsed before broadcast.
    Expired,
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxState::Confirmed | TxState::Rejected | TxState::Expired
        )
    }

    /// Whether the lifecycle admits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TxState) -> bool {
        match (self, next) {
            (from, TxState::Expired) => !from.is_terminal(),
            (TxState::Requested, TxState::Prepared)
            | (TxState::Prepared, TxState::Signed)
            | (TxState::Signed, TxState::Finalized)
            | (TxState::Finalized, TxState::Broadcast)
            | (TxState::Broadcast, TxState::Confirmed)
            | (TxState::Broadcast, TxState::Rejected) => true,
            _ => false,
        }
    }
}

/// Options for a revocation.
#[derive(Debug, Clone, Default)]
pub struct RevokeParams {
    /// Where the anchor value goes, net of fee. `None` burns it as fee.
    pub recipient: Option<String>,
    /// Registry reason code to annotate on chain.
    pub reason_code: Option<u8>,
    /// Txid of the reissued certificate. Requires a reason code.
    pub replacement_txid: Option<Txid>,
}

/// Recorded terminal outcome for one signing hash.
#[derive(Debug, Clone)]
enum Outcome {
    Accepted(TransactionResult),
    Rejected(Error),
}

/// Transaction engine over the interpreter and chain seams.
#[derive(Debug)]
pub struct Pipeline {
    config: Arc<SasConfig>,
    interpreter: Arc<dyn Interpreter>,
    chain: Arc<dyn ChainBackend>,
    audit: Arc<dyn AuditLogger>,
    ttl: Duration,
    ledger: Mutex<HashMap<SigningHash, Outcome>>,
}

impl Pipeline {
    pub fn new(
        config: Arc<SasConfig>,
        interpreter: Arc<dyn Interpreter>,
        chain: Arc<dyn ChainBackend>,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self::with_ttl(
            config,
            interpreter,
            chain,
            audit,
            Duration::seconds(DEFAULT_TTL_SECS),
        )
    }

    /// Same as [`Pipeline::new`] with a caller-chosen prepared TTL.
    pub fn with_ttl(
        config: Arc<SasConfig>,
        interpreter: Arc<dyn Interpreter>,
        chain: Arc<dyn ChainBackend>,
        audit: Arc<dyn AuditLogger>,
        ttl: Duration,
    ) -> Self {
        Pipeline {
            config,
            interpreter,
            chain,
            audit,
            ttl,
            ledger: Mutex::new(HashMap::new()),
        }
    }

    /// Prepare an issuance spending one vault UTXO.
    ///
    /// Output plan, fixed order: vault change, the certificate anchor at
    /// dust, the Attest annotation, the fee. The anchor lands at output
    /// index [`CERT_OUTPUT_INDEX`].
    pub fn prepare_issue(
        &self,
        utxo: &Utxo,
        identifier: &[u8],
        role: Role,
    ) -> Result<PreparedTransaction> {
        authorize(role, Permission::CertIssue)?;
        if utxo.value < MIN_ISSUE_SATS {
            return Err(Error::InsufficientFunds {
                required: MIN_ISSUE_SATS,
                available: utxo.value,
            });
        }
        let annotation = SasPayload::Attest {
            identifier: identifier.to_vec(),
        }
        .encode()?;

        let change = utxo.value - FEE_SATS - CERT_DUST_SATS;
        let contracts = &self.config.contracts;
        let outputs = vec![
            PlannedOutput::pay(contracts.vault.address.clone(), change),
            PlannedOutput::pay(contracts.certificate.address.clone(), CERT_DUST_SATS),
            PlannedOutput::annotation(annotation),
            PlannedOutput::fee(FEE_SATS),
        ];

        let mut details = BTreeMap::new();
        details.insert("identifier".to_string(), identifier_text(identifier));
        details.insert("vault_utxo".to_string(), utxo.outpoint().to_string());
        details.insert("change_sats".to_string(), change.to_string());

        self.assemble(
            TransactionKind::IssueCertificate,
            utxo,
            &outputs,
            &contracts.vault,
            role.issue_path(),
            role,
            details,
        )
    }

    /// Prepare a revocation spending a certificate anchor.
    ///
    /// The Revoke annotation is emitted only when a reason or replacement
    /// is given; a bare spend already revokes. With a recipient and a
    /// non-dust anchor the value is paid out net of fee, otherwise the
    /// whole anchor burns as fee.
    pub fn prepare_revoke(
        &self,
        utxo: &Utxo,
        params: &RevokeParams,
        recorded_issuer: Option<&PublicKey>,
        role: Role,
    ) -> Result<PreparedTransaction> {
        let certificate = utxo.outpoint();
        authorize_revoke(
            role,
            &self.config.public_key(role),
            recorded_issuer,
            &certificate,
        )?;

        let annotation = if params.reason_code.is_some() || params.replacement_txid.is_some() {
            Some(
                SasPayload::Revoke {
                    reference: certificate,
                    reason_code: params.reason_code,
                    replacement_txid: params.replacement_txid,
                }
                .encode()?,
            )
        } else {
            None
        };

        let mut outputs = Vec::with_capacity(3);
        match params.recipient.as_deref() {
            Some(recipient) if utxo.value > FEE_SATS => {
                outputs.push(PlannedOutput::pay(recipient, utxo.value - FEE_SATS));
                if let Some(annotation) = annotation {
                    outputs.push(PlannedOutput::annotation(annotation));
                }
                outputs.push(PlannedOutput::fee(FEE_SATS));
            }
            _ => {
                if let Some(annotation) = annotation {
                    outputs.push(PlannedOutput::annotation(annotation));
                }
                outputs.push(PlannedOutput::fee(utxo.value));
            }
        }

        let mut details = BTreeMap::new();
        details.insert("certificate".to_string(), certificate.to_string());
        if let Some(code) = params.reason_code {
            details.insert("reason_code".to_string(), code.to_string());
        }
        if let Some(recipient) = &params.recipient {
            details.insert("recipient".to_string(), recipient.clone());
        }
        if let Some(txid) = &params.replacement_txid {
            details.insert("replacement_txid".to_string(), txid.to_hex());
        }

        self.assemble(
            TransactionKind::RevokeCertificate,
            utxo,
            &outputs,
            &self.config.contracts.certificate,
            role.revoke_path(),
            role,
            details,
        )
    }

    /// Prepare an unconditional vault drain to `recipient`. Admin only.
    pub fn prepare_drain(
        &self,
        utxo: &Utxo,
        recipient: &str,
        role: Role,
    ) -> Result<PreparedTransaction> {
        authorize(role, Permission::VaultDrain)?;
        if utxo.value < FEE_SATS + CERT_DUST_SATS {
            return Err(Error::InsufficientFunds {
                required: FEE_SATS + CERT_DUST_SATS,
                available: utxo.value,
            });
        }
        let paid = utxo.value - FEE_SATS;
        let outputs = vec![
            PlannedOutput::pay(recipient, paid),
            PlannedOutput::fee(FEE_SATS),
        ];

        let mut details = BTreeMap::new();
        details.insert("recipient".to_string(), recipient.to_string());
        details.insert("value_sats".to_string(), paid.to_string());

        self.assemble(
            TransactionKind::DrainVault,
            utxo,
            &outputs,
            &self.config.contracts.vault,
            SpendingPath::AdminUnconditional,
            role,
            details,
        )
    }

    /// Skeleton assembly: create, bind the spent output, then surface the
    /// transaction digest through a dummy-witness dry run.
    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        kind: TransactionKind,
        utxo: &Utxo,
        outputs: &[PlannedOutput],
        contract: &ContractInfo,
        path: SpendingPath,
        role: Role,
        details: BTreeMap<String, String>,
    ) -> Result<PreparedTransaction> {
        let asset_id = self.config.asset_id();
        let skeleton = self
            .interpreter
            .create(&[utxo.outpoint()], outputs, asset_id)?;

        let binding = InputBinding {
            script_pubkey: contract.script_pubkey.clone(),
            asset_id: asset_id.to_string(),
            value: utxo.value,
            cmr: contract.cmr.clone(),
            internal_key: self.config.taproot.internal_key.clone(),
        };
        let bound = self.interpreter.update_input(&skeleton, 0, &binding)?;

        let report =
            self.interpreter
                .run(&bound, 0, &contract.program, &path.dummy_witness().to_hex())?;
        let digest = report.sig_all_hash().ok_or(Error::SigningHashUnavailable)?;
        let signing_hash = SigningHash::from_hex(&digest)?;

        let prepared = PreparedTransaction::new(
            kind,
            signing_hash,
            bound,
            0,
            contract.program.clone(),
            path,
            role,
            self.config.public_key(role),
            details,
            self.ttl,
        );
        info!(
            id = %prepared.id,
            kind = %kind,
            path = %path,
            digest = %signing_hash,
            "Transaction prepared"
        );
        self.audit.record(&AuditEvent::TransactionPrepared {
            id: prepared.id.to_string(),
            kind,
            signing_hash: signing_hash.to_hex(),
            signer_role: role,
        });
        Ok(prepared)
    }

    /// Attach the signature and push the transaction onto the network:
    /// witness encode, covenant dry run, finalize, extract, broadcast.
    ///
    /// Keyed by `prepared.signing_hash`. A recorded broadcast outcome is
    /// replayed without external calls, even after the TTL lapsed. A
    /// rejected signature or an unknown broadcast outcome (timeout,
    /// transport failure) records nothing, so the caller may retry.
    pub fn finalize(
        &self,
        prepared: &PreparedTransaction,
        signature: &Signature,
    ) -> Result<TransactionResult> {
        if let Some(outcome) = self.recorded(&prepared.signing_hash) {
            debug!(id = %prepared.id, "Replaying recorded broadcast outcome");
            return match outcome {
                Outcome::Accepted(result) => Ok(result),
                Outcome::Rejected(err) => Err(err),
            };
        }
        if prepared.is_expired() {
            return Err(Error::TransactionExpired(prepared.expires_at));
        }

        // A locally invalid signature never reaches the interpreter.
        prepared
            .required_pubkey
            .verify(&prepared.signing_hash, signature)?;
        let witness = prepared.path.encode_witness(signature.as_bytes())?;

        let report = self.interpreter.run(
            &prepared.pset,
            prepared.input_index,
            &prepared.program,
            &witness.to_hex(),
        )?;
        if !report.success {
            let failed_jets = report.failed_jets();
            warn!(id = %prepared.id, jets = ?failed_jets, "Covenant dry run failed");
            return Err(Error::SignatureRejected { failed_jets });
        }

        let finalized = self.interpreter.finalize(
            &prepared.pset,
            prepared.input_index,
            &prepared.program,
            &witness.to_hex(),
        )?;
        self.audit.record(&AuditEvent::TransactionFinalized {
            id: prepared.id.to_string(),
            signing_hash: prepared.signing_hash.to_hex(),
        });
        let raw_hex = self.interpreter.extract(&finalized)?;

        match self.chain.broadcast(&raw_hex) {
            Ok(txid) => {
                let result = TransactionResult { txid, raw_hex };
                self.record(prepared.signing_hash, Outcome::Accepted(result.clone()));
                info!(id = %prepared.id, txid = %txid, "Transaction broadcast");
                self.audit.record(&AuditEvent::TransactionBroadcast {
                    id: prepared.id.to_string(),
                    signing_hash: prepared.signing_hash.to_hex(),
                    txid,
                });
                self.record_effect(prepared, txid);
                Ok(result)
            }
            Err(Error::BroadcastRejected(reason)) => {
                let err = Error::BroadcastRejected(reason.clone());
                self.record(prepared.signing_hash, Outcome::Rejected(err.clone()));
                warn!(id = %prepared.id, reason = %reason, "Broadcast rejected");
                self.audit.record(&AuditEvent::BroadcastRejected {
                    id: prepared.id.to_string(),
                    signing_hash: prepared.signing_hash.to_hex(),
                    reason,
                });
                Err(err)
            }
            // Timeout or transport failure: the transaction may or may not
            // have reached the mempool. Record nothing.
            Err(err) => {
                warn!(id = %prepared.id, error = %err, "Broadcast outcome unknown");
                Err(err)
            }
        }
    }

    /// Ledger-backed view of where a signing hash ended up, if anywhere.
    pub fn state_of(&self, hash: &SigningHash) -> Option<TxState> {
        self.recorded(hash).map(|outcome| match outcome {
            Outcome::Accepted(_) => TxState::Broadcast,
            Outcome::Rejected(_) => TxState::Rejected,
        })
    }

    /// Domain-level audit event for an accepted broadcast. Field values
    /// come from the details map the prepare call wrote; an unparseable
    /// entry drops the event rather than fail the broadcast.
    fn record_effect(&self, prepared: &PreparedTransaction, txid: Txid) {
        match prepared.kind {
            TransactionKind::IssueCertificate => {
                let identifier = prepared
                    .details
                    .get("identifier")
                    .cloned()
                    .unwrap_or_default();
                self.audit.record(&AuditEvent::CertificateIssued {
                    txid,
                    outpoint: Outpoint::new(txid, CERT_OUTPUT_INDEX),
                    identifier,
                });
            }
            TransactionKind::RevokeCertificate => {
                let Some(certificate) = prepared
                    .details
                    .get("certificate")
                    .and_then(|s| s.parse::<Outpoint>().ok())
                else {
                    return;
                };
                let reason_code = prepared
                    .details
                    .get("reason_code")
                    .and_then(|s| s.parse().ok());
                self.audit.record(&AuditEvent::CertificateRevoked {
                    certificate,
                    txid,
                    reason_code,
                });
            }
            TransactionKind::DrainVault => {
                let recipient = prepared
                    .details
                    .get("recipient")
                    .cloned()
                    .unwrap_or_default();
                let value = prepared
                    .details
                    .get("value_sats")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                self.audit.record(&AuditEvent::VaultDrained {
                    txid,
                    recipient,
                    value,
                });
            }
        }
    }

    fn recorded(&self, hash: &SigningHash) -> Option<Outcome> {
        let ledger = self
            .ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ledger.get(hash).cloned()
    }

    fn record(&self, hash: SigningHash, outcome: Outcome) {
        let mut ledger = self
            .ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ledger.insert(hash, outcome);
    }
}
