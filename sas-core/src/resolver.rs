//! Chain-derived certificate status.
//!
//! A certificate's validity is nothing but the spend state of its anchor
//! outpoint: unspent means valid, spent means revoked. The resolver
//! recomputes a [`Certificate`] view from chain state on every call and
//! persists nothing, so it can never disagree with the chain.
//!
//! An outpoint the chain has never seen (no such transaction, or the
//! index points past the outputs) resolves to status `Unknown`. That is
//! an answer, not an error; only transport and API failures return `Err`.

use std::sync::Arc;

use tracing::debug;

use crate::chain::{ChainBackend, ChainTransaction};
use crate::error::Result;
use crate::models::{Certificate, CertificateStatus, Outpoint};
use crate::protocol::{identifier_text, SasPayload};
use crate::CERT_OUTPUT_INDEX;

/// Resolves certificate status from the chain.
#[derive(Debug, Clone)]
pub struct CertificateResolver {
    chain: Arc<dyn ChainBackend>,
}

impl CertificateResolver {
    pub fn new(chain: Arc<dyn ChainBackend>) -> Self {
        CertificateResolver { chain }
    }

    /// Recompute the certificate anchored at `outpoint`.
    ///
    /// The spend is authoritative: a spent anchor is `Revoked` even when
    /// the spending transaction carries no decodable Revoke annotation.
    /// Reason code and replacement are surfaced only from a Revoke whose
    /// reference names this exact outpoint.
    pub fn resolve(&self, outpoint: &Outpoint) -> Result<Certificate> {
        let Some(tx) = self.chain.transaction(&outpoint.txid)? else {
            debug!(outpoint = %outpoint, "Anchor transaction not on chain");
            return Ok(Certificate::unknown(*outpoint));
        };
        let Some(anchor) = tx.output(outpoint.vout) else {
            debug!(outpoint = %outpoint, "Anchor index past the last output");
            return Ok(Certificate::unknown(*outpoint));
        };

        let cid = annotation_in(&tx).and_then(|payload| match payload {
            SasPayload::Attest { identifier } | SasPayload::Update { identifier } => {
                Some(identifier_text(&identifier))
            }
            SasPayload::Revoke { .. } => None,
        });

        let mut certificate = Certificate {
            outpoint: *outpoint,
            cid,
            status: CertificateStatus::Valid,
            value: anchor.value,
            issued_at: tx.status.block_height,
            revoked_at: None,
            reason_code: None,
            replacement: None,
        };

        let spend = match self.chain.outspend(&outpoint.txid, outpoint.vout)? {
            Some(outspend) if outspend.spent => outspend,
            _ => return Ok(certificate),
        };

        certificate.status = CertificateStatus::Revoked;
        certificate.revoked_at = spend.status.as_ref().and_then(|s| s.block_height);

        if let Some(spend_txid) = spend.txid {
            if let Some(spend_tx) = self.chain.transaction(&spend_txid)? {
                if let Some(SasPayload::Revoke {
                    reference,
                    reason_code,
                    replacement_txid,
                }) = annotation_in(&spend_tx)
                {
                    // Metadata only counts when the annotation names this
                    // anchor; a batch spend may reference a different one.
                    if reference == *outpoint {
                        certificate.reason_code = reason_code;
                        certificate.replacement = replacement_txid
                            .map(|txid| Outpoint::new(txid, CERT_OUTPUT_INDEX));
                    }
                }
            }
        }

        Ok(certificate)
    }
}

/// First decodable annotation across a transaction's outputs.
fn annotation_in(tx: &ChainTransaction) -> Option<SasPayload> {
    tx.vout
        .iter()
        .filter(|out| out.is_annotation())
        .find_map(|out| {
            let script = hex::decode(&out.scriptpubkey).ok()?;
            let data = annotation_bytes(&script)?;
            SasPayload::decode(data).ok()
        })
}

/// Extract the single datum pushed by an OP_RETURN script.
///
/// Covers the push encodings an annotation can use: direct pushes
/// (opcodes 0x01 through 0x4b), OP_PUSHDATA1, and OP_PUSHDATA2. The push
/// must consume the rest of the script exactly.
fn annotation_bytes(script: &[u8]) -> Option<&[u8]> {
    const OP_RETURN: u8 = 0x6a;
    const OP_PUSHDATA1: u8 = 0x4c;
    const OP_PUSHDATA2: u8 = 0x4d;

    let (&marker, rest) = script.split_first()?;
    if marker != OP_RETURN {
        return None;
    }
    let (&opcode, rest) = rest.split_first()?;
    let (length, data) = match opcode {
        1..=0x4b => (opcode as usize, rest),
        OP_PUSHDATA1 => {
            let (&length, data) = rest.split_first()?;
            (length as usize, data)
        }
        OP_PUSHDATA2 => {
            let length = u16::from_le_bytes([*rest.first()?, *rest.get(1)?]);
            (length as usize, rest.get(2..)?)
        }
        _ => return None,
    };
    (data.len() == length).then_some(data)
}
