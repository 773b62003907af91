//! Resolver behavior over fabricated chain state: validity is the spend
//! state of the anchor, metadata only comes from a Revoke annotation
//! that names the anchor.

use std::collections::HashMap;
use std::sync::Arc;

use sas_core::chain::{ChainBackend, ChainTransaction, Outspend, TxConfirmation, TxOutput};
use sas_core::error::Result;
use sas_core::models::{CertificateStatus, Outpoint, Txid, Utxo};
use sas_core::protocol::{reason, SasPayload};
use sas_core::resolver::CertificateResolver;
use sas_core::CERT_DUST_SATS;

#[derive(Debug, Default)]
struct MapChain {
    transactions: HashMap<Txid, ChainTransaction>,
    outspends: HashMap<(Txid, u32), Outspend>,
}

impl MapChain {
    fn with_transaction(mut self, tx: ChainTransaction) -> Self {
        self.transactions.insert(tx.txid, tx);
        self
    }

    fn with_outspend(mut self, outpoint: Outpoint, outspend: Outspend) -> Self {
        self.outspends
            .insert((outpoint.txid, outpoint.vout), outspend);
        self
    }

    fn resolver(self) -> CertificateResolver {
        CertificateResolver::new(Arc::new(self))
    }
}

impl ChainBackend for MapChain {
    fn utxos(&self, _address: &str) -> Result<Vec<Utxo>> {
        unimplemented!("resolver must not list utxos")
    }

    fn transaction(&self, txid: &Txid) -> Result<Option<ChainTransaction>> {
        Ok(self.transactions.get(txid).cloned())
    }

    fn transaction_status(&self, _txid: &Txid) -> Result<Option<TxConfirmation>> {
        unimplemented!("resolver must not poll status")
    }

    fn outspend(&self, txid: &Txid, vout: u32) -> Result<Option<Outspend>> {
        Ok(self.outspends.get(&(*txid, vout)).cloned())
    }

    fn broadcast(&self, _raw_hex: &str) -> Result<Txid> {
        unimplemented!("resolver must not broadcast")
    }

    fn tip_height(&self) -> Result<u64> {
        unimplemented!("resolver must not read the tip")
    }
}

fn txid(fill: u8) -> Txid {
    Txid::from_bytes([fill; 32])
}

fn pay_output(value: u64) -> TxOutput {
    TxOutput {
        scriptpubkey: format!("5120{}", "37".repeat(32)),
        scriptpubkey_type: "v1_p2tr".to_string(),
        scriptpubkey_address: Some("tex1p".to_string()),
        value,
        asset: None,
    }
}

fn annotation_output(payload: &SasPayload) -> TxOutput {
    let data = payload.encode().unwrap();
    let mut script = vec![0x6A, data.len() as u8];
    script.extend_from_slice(&data);
    TxOutput {
        scriptpubkey: hex::encode(script),
        scriptpubkey_type: "op_return".to_string(),
        scriptpubkey_address: None,
        value: 0,
        asset: None,
    }
}

fn confirmed_at(height: u64) -> TxConfirmation {
    TxConfirmation {
        confirmed: true,
        block_height: Some(height),
        block_time: Some(1_767_796_198),
    }
}

/// Issuing transaction: change, anchor at index 1, Attest annotation.
fn issuing_tx(id: Txid, identifier: &[u8], status: TxConfirmation) -> ChainTransaction {
    ChainTransaction {
        txid: id,
        vout: vec![
            pay_output(90_000),
            pay_output(CERT_DUST_SATS),
            annotation_output(&SasPayload::Attest {
                identifier: identifier.to_vec(),
            }),
        ],
        status,
    }
}

fn unspent() -> Outspend {
    Outspend {
        spent: false,
        txid: None,
        vin: None,
        status: None,
    }
}

fn spent_by(spender: Txid, height: u64) -> Outspend {
    Outspend {
        spent: true,
        txid: Some(spender),
        vin: Some(0),
        status: Some(confirmed_at(height)),
    }
}

#[test]
fn test_unspent_anchor_resolves_valid() {
    let t = txid(0x71);
    let anchor = Outpoint::new(t, 1);
    let resolver = MapChain::default()
        .with_transaction(issuing_tx(t, b"EX-NEW-1767796198", confirmed_at(1_000)))
        .with_outspend(anchor, unspent())
        .resolver();

    let cert = resolver.resolve(&anchor).unwrap();
    assert_eq!(cert.status, CertificateStatus::Valid);
    assert!(cert.is_valid());
    assert_eq!(cert.cid.as_deref(), Some("EX-NEW-1767796198"));
    assert_eq!(cert.value, CERT_DUST_SATS);
    assert_eq!(cert.issued_at, Some(1_000));
    assert_eq!(cert.revoked_at, None);
    assert_eq!(cert.reason_code, None);
    assert_eq!(cert.replacement, None);
}

#[test]
fn test_spent_anchor_resolves_revoked_with_metadata() {
    let t = txid(0x71);
    let r = txid(0x72);
    let u = txid(0x73);
    let anchor = Outpoint::new(t, 1);

    let revoke_tx = ChainTransaction {
        txid: r,
        vout: vec![annotation_output(&SasPayload::Revoke {
            reference: anchor,
            reason_code: Some(reason::REISSUE_REPLACEMENT),
            replacement_txid: Some(u),
        })],
        status: confirmed_at(1_200),
    };
    let resolver = MapChain::default()
        .with_transaction(issuing_tx(t, b"EX-NEW-1767796198", confirmed_at(1_000)))
        .with_transaction(revoke_tx)
        .with_outspend(anchor, spent_by(r, 1_200))
        .resolver();

    let cert = resolver.resolve(&anchor).unwrap();
    assert_eq!(cert.status, CertificateStatus::Revoked);
    assert!(!cert.is_valid());
    // The issuing annotation still names the certificate.
    assert_eq!(cert.cid.as_deref(), Some("EX-NEW-1767796198"));
    assert_eq!(cert.issued_at, Some(1_000));
    assert_eq!(cert.revoked_at, Some(1_200));
    assert_eq!(cert.reason_code, Some(reason::REISSUE_REPLACEMENT));
    assert_eq!(cert.reason_name(), Some("REISSUE_REPLACEMENT"));
    // The replacement anchor is the fixed certificate slot of the
    // reissuing transaction.
    assert_eq!(cert.replacement, Some(Outpoint::new(u, 1)));
}

#[test]
fn test_unknown_transaction_is_a_result_not_an_error() {
    let resolver = MapChain::default().resolver();
    let anchor = Outpoint::new(txid(0xEE), 1);

    let cert = resolver.resolve(&anchor).unwrap();
    assert_eq!(cert.status, CertificateStatus::Unknown);
    assert!(!cert.is_valid());
    assert_eq!(cert.cid, None);
    assert_eq!(cert.outpoint, anchor);
}

#[test]
fn test_vout_past_the_outputs_is_unknown() {
    let t = txid(0x71);
    let resolver = MapChain::default()
        .with_transaction(issuing_tx(t, b"EX", confirmed_at(1_000)))
        .resolver();

    let cert = resolver.resolve(&Outpoint::new(t, 7)).unwrap();
    assert_eq!(cert.status, CertificateStatus::Unknown);
}

#[test]
fn test_bare_spend_still_revokes() {
    // The spending transaction carries no annotation at all. The spend
    // is authoritative; only the metadata is missing.
    let t = txid(0x71);
    let r = txid(0x72);
    let anchor = Outpoint::new(t, 1);

    let sweep_tx = ChainTransaction {
        txid: r,
        vout: vec![pay_output(46)],
        status: confirmed_at(1_500),
    };
    let resolver = MapChain::default()
        .with_transaction(issuing_tx(t, b"EX", confirmed_at(1_000)))
        .with_transaction(sweep_tx)
        .with_outspend(anchor, spent_by(r, 1_500))
        .resolver();

    let cert = resolver.resolve(&anchor).unwrap();
    assert_eq!(cert.status, CertificateStatus::Revoked);
    assert_eq!(cert.revoked_at, Some(1_500));
    assert_eq!(cert.reason_code, None);
    assert_eq!(cert.replacement, None);
}

#[test]
fn test_foreign_revoke_reference_contributes_no_metadata() {
    // The spending transaction annotates the revocation of a different
    // anchor; its reason must not leak onto this one.
    let t = txid(0x71);
    let r = txid(0x72);
    let anchor = Outpoint::new(t, 1);

    let revoke_tx = ChainTransaction {
        txid: r,
        vout: vec![annotation_output(&SasPayload::Revoke {
            reference: Outpoint::new(t, 0),
            reason_code: Some(reason::FRAUD_CONFIRMED),
            replacement_txid: None,
        })],
        status: confirmed_at(1_200),
    };
    let resolver = MapChain::default()
        .with_transaction(issuing_tx(t, b"EX", confirmed_at(1_000)))
        .with_transaction(revoke_tx)
        .with_outspend(anchor, spent_by(r, 1_200))
        .resolver();

    let cert = resolver.resolve(&anchor).unwrap();
    assert_eq!(cert.status, CertificateStatus::Revoked);
    assert_eq!(cert.reason_code, None);
    assert_eq!(cert.replacement, None);
}

#[test]
fn test_mempool_issue_has_no_height_yet() {
    let t = txid(0x71);
    let anchor = Outpoint::new(t, 1);
    let resolver = MapChain::default()
        .with_transaction(issuing_tx(t, b"EX", TxConfirmation::default()))
        .with_outspend(anchor, unspent())
        .resolver();

    let cert = resolver.resolve(&anchor).unwrap();
    assert_eq!(cert.status, CertificateStatus::Valid);
    assert_eq!(cert.issued_at, None);
}

#[test]
fn test_spender_missing_from_chain_still_revokes() {
    let t = txid(0x71);
    let anchor = Outpoint::new(t, 1);
    let resolver = MapChain::default()
        .with_transaction(issuing_tx(t, b"EX", confirmed_at(1_000)))
        .with_outspend(anchor, spent_by(txid(0x99), 1_300))
        .resolver();

    let cert = resolver.resolve(&anchor).unwrap();
    assert_eq!(cert.status, CertificateStatus::Revoked);
    assert_eq!(cert.revoked_at, Some(1_300));
    assert_eq!(cert.reason_code, None);
}

#[test]
fn test_binary_identifier_surfaces_as_hex() {
    let t = txid(0x71);
    let anchor = Outpoint::new(t, 1);
    let resolver = MapChain::default()
        .with_transaction(issuing_tx(t, &[0xDE, 0xAD, 0xBE, 0xEF], confirmed_at(1_000)))
        .with_outspend(anchor, unspent())
        .resolver();

    let cert = resolver.resolve(&anchor).unwrap();
    assert_eq!(cert.cid.as_deref(), Some("deadbeef"));
}
