//! # SAS Core
//!
//! UTXO-anchored digital certificate engine.
//!
//! A certificate here is not a signed document: it is an unspent
//! transaction output on a Liquid-style chain, guarded by a covenant and
//! bound to an external identifier through an OP_RETURN annotation in the
//! issuing transaction. Validity IS the spend state. While the anchor
//! outpoint sits unspent the certificate is valid; the moment any
//! authorized key spends it, it is revoked, atomically and for everyone.
//! There is no list to distribute and no server to ask: any verifier with
//! chain access recomputes the same answer.
//!
//! ## Key Concepts
//!
//! - **Anchor**: the dust-level UTXO whose spend state is the
//!   certificate's validity.
//! - **Annotation**: the binary `SAS` OP_RETURN record binding an
//!   identifier to the anchor (and, on revocation, carrying the reason
//!   and replacement).
//! - **Spending path**: one arm of a contract's covenant decision tree;
//!   the witness selects it with a prefix-free bit tag.
//! - **Pipeline**: prepare/sign/finalize around the external covenant
//!   interpreter, idempotent over the transaction digest so a retried
//!   finalize can never double-broadcast.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sas_core::{Outpoint, Role, SasClient, SasConfig, CERT_OUTPUT_INDEX};
//!
//! let config = SasConfig::from_file("sas.json")?;
//! let client = SasClient::new(config)?;
//!
//! // Issue: one vault UTXO in, the anchor lands at output index 1.
//! let result = client.issue_certificate(b"EX-2024-001", Role::Delegate)?;
//! let anchor = Outpoint::new(result.txid, CERT_OUTPUT_INDEX);
//!
//! // Verify: validity is the anchor's spend state, nothing else.
//! assert!(client.verify(&anchor)?);
//!
//! // Revoke: spend the anchor.
//! client.revoke_certificate(&anchor, &Default::default(), Role::Delegate)?;
//! ```

pub mod audit;
pub mod chain;
pub mod client;
pub mod config;
pub mod confirmation;
pub mod crypto;
pub mod error;
pub mod fees;
pub mod interpreter;
pub mod models;
pub mod pipeline;
pub mod prepared;
pub mod protocol;
pub mod resolver;
pub mod roles;
pub mod witness;

// Re-exports for convenience
pub use audit::{AuditEvent, AuditLogger, JsonLinesLogger, NoopLogger};
pub use chain::{
    ChainBackend, ChainTransaction, EsploraBackend, Outspend, TxConfirmation, TxOutput,
};
pub use client::SasClient;
pub use config::SasConfig;
pub use confirmation::{ConfirmationStatus, ConfirmationTracker, TxStatus, DEEP_CONFIRMATIONS};
pub use crypto::{PublicKey, Signature, SigningHash, SigningKey};
pub use error::{Error, ErrorCode, Result};
pub use fees::{FeeEstimate, FeeEstimator, FeePriority, MIN_FEE_SATS};
pub use interpreter::{HalSimplicity, InputBinding, Interpreter, PlannedOutput, RunReport};
pub use models::{
    Certificate, CertificateStatus, Network, Outpoint, TransactionResult, Txid, Utxo, Vault,
};
pub use pipeline::{Pipeline, RevokeParams, TxState};
pub use prepared::{
    PreparedId, PreparedTransaction, TransactionKind, DEFAULT_TTL_SECS, PREPARED_ID_PREFIX,
};
pub use protocol::{SasPayload, MAX_OP_RETURN_SIZE, MAX_PAYLOAD_SIZE};
pub use resolver::CertificateResolver;
pub use roles::{Permission, Role};
pub use witness::{ContractKind, SpendingPath, Witness, SIGNATURE_SIZE, WITNESS_SIZE};

/// Network fee paid by every engine transaction, in satoshis.
pub const FEE_SATS: u64 = 500;

/// Value carried by a certificate anchor output, in satoshis. The dust
/// floor keeps the anchor relayable while staying economically inert.
pub const CERT_DUST_SATS: u64 = 546;

/// Smallest vault UTXO that funds one issuance: the fee, the anchor, and
/// a change output that itself stays above dust.
pub const MIN_ISSUE_SATS: u64 = FEE_SATS + 2 * CERT_DUST_SATS;

/// Suggested vault deposit, enough for a comfortable run of issuances.
pub const RECOMMENDED_DEPOSIT_SATS: u64 = 100_000;

/// Output index of the certificate anchor in every issuance transaction.
pub const CERT_OUTPUT_INDEX: u32 = 1;

/// Unspendable (NUMS) taproot internal key, forcing script-path spends.
pub const DEFAULT_INTERNAL_KEY: &str =
    "50929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0";
