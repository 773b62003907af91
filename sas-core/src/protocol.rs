//! SAS annotation protocol: the binary OP_RETURN payload format.
//!
//! Every annotation fits a standard 80-byte OP_RETURN and starts with a
//! fixed five-byte header:
//!
//! ```text
//! +-----------+-------------+----------+------------------------+
//! | TAG (3B)  | VERSION (1B)| TYPE (1B)| PAYLOAD (0..=75 bytes) |
//! | b"SAS"    | 0x01        |          |                        |
//! +-----------+-------------+----------+------------------------+
//! ```
//!
//! ## Operations
//!
//! - `Attest` (0x01) and `Update` (0x03) carry a raw identifier, up to 75
//!   bytes. Identifiers are bytes end to end; nothing re-interprets them,
//!   which keeps encoding injective.
//! - `Revoke` (0x02) carries the anchor outpoint being spent (32-byte txid
//!   plus 2-byte big-endian vout), an optional reason code, and an optional
//!   replacement txid. A replacement is only legal alongside a reason, so
//!   the only valid payload lengths are exactly 34, 35, and 67 bytes.
//!
//! Decoding is greedy and fixed-offset: no length prefixes, no TLVs. The
//! size gate runs before any parsing.

use crate::error::{Error, Result};
use crate::models::{Outpoint, Txid};

/// Leading magic of every annotation.
pub const TAG: [u8; 3] = *b"SAS";

/// The single wire version this build speaks.
pub const VERSION: u8 = 0x01;

/// Whole-annotation budget: a standard OP_RETURN push.
pub const MAX_OP_RETURN_SIZE: usize = 80;

/// Tag + version + type.
pub const HEADER_SIZE: usize = 5;

/// What remains for the operation payload.
pub const MAX_PAYLOAD_SIZE: usize = MAX_OP_RETURN_SIZE - HEADER_SIZE;

/// Operation type bytes.
pub const TYPE_ATTEST: u8 = 0x01;
pub const TYPE_REVOKE: u8 = 0x02;
pub const TYPE_UPDATE: u8 = 0x03;
/// Reserved type codes. No payload structure is defined for them in this
/// version; decoding them yields `UnknownOperation`.
pub const TYPE_DELEGATE: u8 = 0x10;
pub const TYPE_UNDELEGATE: u8 = 0x11;

// Revoke payload shapes. txid(32) + vout(2), then optionally reason(1),
// then optionally replacement txid(32).
const REVOKE_BARE: usize = 34;
const REVOKE_WITH_REASON: usize = 35;
const REVOKE_WITH_REPLACEMENT: usize = 67;

/// Registered revocation reason codes. The wire accepts any u8; these are
/// the values with agreed meanings.
pub mod reason {
    pub const DATA_ERROR: u8 = 1;
    pub const DUPLICATE: u8 = 2;
    pub const FRAUD_SUSPECTED: u8 = 3;
    pub const FRAUD_CONFIRMED: u8 = 4;
    pub const HOLDER_REQUEST: u8 = 5;
    pub const REISSUE_REPLACEMENT: u8 = 6;
    pub const ADMINISTRATIVE: u8 = 7;
    pub const LEGAL_ORDER: u8 = 8;
    pub const KEY_COMPROMISE: u8 = 9;
    pub const SUSPENDED: u8 = 10;
    pub const CRYPTO_DEPRECATED: u8 = 11;
    pub const PROCESS_ERROR: u8 = 12;
}

/// Registry name for a reason code. Unregistered codes return None but
/// still travel the wire verbatim.
pub fn reason_name(code: u8) -> Option<&'static str> {
    Some(match code {
        1 => "DATA_ERROR",
        2 => "DUPLICATE",
        3 => "FRAUD_SUSPECTED",
        4 => "FRAUD_CONFIRMED",
        5 => "HOLDER_REQUEST",
        6 => "REISSUE_REPLACEMENT",
        7 => "ADMINISTRATIVE",
        8 => "LEGAL_ORDER",
        9 => "KEY_COMPROMISE",
        10 => "SUSPENDED",
        11 => "CRYPTO_DEPRECATED",
        12 => "PROCESS_ERROR",
        13..=15 => "RESERVED",
        _ => return None,
    })
}

/// Render identifier bytes the way status reports do: UTF-8 when the bytes
/// are valid UTF-8, lowercase hex otherwise.
pub fn identifier_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => hex::encode(bytes),
    }
}

/// A decoded annotation operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SasPayload {
    /// Bind an identifier to the certificate output of this transaction.
    Attest { identifier: Vec<u8> },
    /// Spend a certificate anchor, optionally saying why and what replaces it.
    Revoke {
        /// The anchor outpoint being revoked.
        reference: Outpoint,
        reason_code: Option<u8>,
        /// Txid of the reissued certificate. Requires a reason code.
        replacement_txid: Option<Txid>,
    },
    /// Amend the identifier bound to an existing certificate.
    Update { identifier: Vec<u8> },
}

impl SasPayload {
    /// Wire type byte for this operation.
    pub fn type_byte(&self) -> u8 {
        match self {
            SasPayload::Attest { .. } => TYPE_ATTEST,
            SasPayload::Revoke { .. } => TYPE_REVOKE,
            SasPayload::Update { .. } => TYPE_UPDATE,
        }
    }

    /// Encode to annotation bytes (header + payload).
    ///
    /// Pure and total over well-formed payloads. Fails only on a payload
    /// over [`MAX_PAYLOAD_SIZE`] or a replacement without a reason.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = self.encode_payload()?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
        out.extend_from_slice(&TAG);
        out.push(VERSION);
        out.push(self.type_byte());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        match self {
            SasPayload::Attest { identifier } | SasPayload::Update { identifier } => {
                Ok(identifier.clone())
            }
            SasPayload::Revoke {
                reference,
                reason_code,
                replacement_txid,
            } => {
                if replacement_txid.is_some() && reason_code.is_none() {
                    return Err(Error::ReplacementRequiresReason);
                }
                let vout = u16::try_from(reference.vout).map_err(|_| {
                    Error::InvalidOutpoint(format!(
                        "vout {} does not fit the wire's two bytes",
                        reference.vout
                    ))
                })?;
                let mut payload = Vec::with_capacity(REVOKE_WITH_REPLACEMENT);
                payload.extend_from_slice(reference.txid.as_bytes());
                payload.extend_from_slice(&vout.to_be_bytes());
                if let Some(code) = reason_code {
                    payload.push(*code);
                }
                if let Some(txid) = replacement_txid {
                    payload.extend_from_slice(txid.as_bytes());
                }
                Ok(payload)
            }
        }
    }

    /// Decode annotation bytes.
    ///
    /// Checks run in a fixed order so every rejection is specific: size
    /// gate, tag, full header, version, then the typed payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_OP_RETURN_SIZE {
            return Err(Error::PayloadTooLarge {
                size: data.len(),
                max: MAX_OP_RETURN_SIZE,
            });
        }
        if data.len() < TAG.len() || data[..TAG.len()] != TAG {
            return Err(Error::UnknownTag);
        }
        if data.len() < HEADER_SIZE {
            return Err(Error::TruncatedPayload {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        let version = data[3];
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let payload = &data[HEADER_SIZE..];
        match data[4] {
            TYPE_ATTEST => Ok(SasPayload::Attest {
                identifier: payload.to_vec(),
            }),
            TYPE_UPDATE => Ok(SasPayload::Update {
                identifier: payload.to_vec(),
            }),
            TYPE_REVOKE => Self::decode_revoke(payload),
            other => Err(Error::UnknownOperation(other)),
        }
    }

    fn decode_revoke(payload: &[u8]) -> Result<Self> {
        let valid = matches!(
            payload.len(),
            REVOKE_BARE | REVOKE_WITH_REASON | REVOKE_WITH_REPLACEMENT
        );
        if !valid {
            let expected = if payload.len() < REVOKE_WITH_REASON {
                REVOKE_BARE
            } else {
                REVOKE_WITH_REPLACEMENT
            };
            return Err(Error::TruncatedPayload {
                expected,
                actual: payload.len(),
            });
        }

        let mut txid = [0u8; 32];
        txid.copy_from_slice(&payload[..32]);
        let vout = u16::from_be_bytes([payload[32], payload[33]]) as u32;
        let reference = Outpoint::new(Txid::from_bytes(txid), vout);

        let reason_code = (payload.len() > REVOKE_BARE).then(|| payload[34]);
        let replacement_txid = (payload.len() == REVOKE_WITH_REPLACEMENT).then(|| {
            let mut t = [0u8; 32];
            t.copy_from_slice(&payload[35..67]);
            Txid::from_bytes(t)
        });

        Ok(SasPayload::Revoke {
            reference,
            reason_code,
            replacement_txid,
        })
    }
}
