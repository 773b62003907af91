//! Structured audit events.
//!
//! The pipeline reports every externally visible transition as an
//! [`AuditEvent`]. Recording is fire-and-forget: a logger must never fail
//! or block the operation it describes. Loggers are threaded explicitly
//! through constructors; there is no global registry.

use std::fmt;

use chrono::Utc;
use serde::Serialize;

use crate::models::{Outpoint, Txid};
use crate::prepared::TransactionKind;
use crate::roles::Role;

/// One externally visible pipeline transition.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A prepare call produced a skeleton and a digest to sign.
    TransactionPrepared {
        id: String,
        kind: TransactionKind,
        signing_hash: String,
        signer_role: Role,
    },
    /// The witness passed the covenant dry run and was attached.
    TransactionFinalized { id: String, signing_hash: String },
    /// The chain accepted the raw transaction.
    TransactionBroadcast {
        id: String,
        signing_hash: String,
        txid: Txid,
    },
    /// The chain refused the raw transaction. Terminal for this skeleton.
    BroadcastRejected {
        id: String,
        signing_hash: String,
        reason: String,
    },
    /// A certificate now exists at `outpoint`.
    CertificateIssued {
        txid: Txid,
        outpoint: Outpoint,
        identifier: String,
    },
    /// A certificate anchor was spent.
    CertificateRevoked {
        certificate: Outpoint,
        txid: Txid,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason_code: Option<u8>,
    },
    /// The vault was emptied to a recipient.
    VaultDrained {
        txid: Txid,
        recipient: String,
        value: u64,
    },
}

/// Sink for audit events.
pub trait AuditLogger: Send + Sync + fmt::Debug {
    fn record(&self, event: &AuditEvent);
}

/// Writes one JSON object per event to stdout.
#[derive(Debug, Default, Clone)]
pub struct JsonLinesLogger;

#[derive(Serialize)]
struct Envelope<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a AuditEvent,
}

impl AuditLogger for JsonLinesLogger {
    fn record(&self, event: &AuditEvent) {
        let envelope = Envelope {
            timestamp: Utc::now().to_rfc3339(),
            event,
        };
        if let Ok(line) = serde_json::to_string(&envelope) {
            println!("{line}");
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone)]
pub struct NoopLogger;

impl AuditLogger for NoopLogger {
    fn record(&self, _event: &AuditEvent) {}
}
