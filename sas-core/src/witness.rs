//! Covenant witness encoding.
//!
//! Each contract exposes a small closed set of spending paths behind an
//! Either-of-Either decision tree. The witness selects a path with a short
//! prefix-free bit tag, carries the 512-bit Schnorr signature, and zero-pads
//! to the fixed input width the contract's type declares. Every path of both
//! contracts encodes to exactly [`WITNESS_SIZE`] bytes.
//!
//! Layouts, most significant bit first:
//!
//! ```text
//! vault:
//!   AdminUnconditional   0  | sig(512) | 0000000
//!   AdminIssue           10 | sig(512) | 000000
//!   DelegateIssue        11 | sig(512) | 000000
//! certificate:
//!   AdminRevoke          0  | sig(512) | 0000000
//!   DelegateRevoke       1  | sig(512) | 0000000
//! ```
//!
//! Encoding is a pure total function over a valid path and a 64-byte
//! signature. It never checks that the signature verifies; the covenant
//! does that on-chain and the dry run does it off-chain.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed witness width for both contracts: 520 bits.
pub const WITNESS_SIZE: usize = 65;

/// Schnorr signatures are exactly 64 bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Which contract a spending path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    Vault,
    Certificate,
}

/// The closed set of spending paths across both contracts.
///
/// Unknown paths are unrepresentable: adding one means adding a variant
/// and a row in the layout table below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendingPath {
    /// Vault: admin spends without covenant-imposed structure.
    AdminUnconditional,
    /// Vault: admin issues a certificate.
    AdminIssue,
    /// Vault: delegate issues a certificate.
    DelegateIssue,
    /// Certificate: admin revokes.
    AdminRevoke,
    /// Certificate: delegate revokes.
    DelegateRevoke,
}

impl SpendingPath {
    pub const ALL: [SpendingPath; 5] = [
        SpendingPath::AdminUnconditional,
        SpendingPath::AdminIssue,
        SpendingPath::DelegateIssue,
        SpendingPath::AdminRevoke,
        SpendingPath::DelegateRevoke,
    ];

    pub fn contract(&self) -> ContractKind {
        match self {
            SpendingPath::AdminUnconditional
            | SpendingPath::AdminIssue
            | SpendingPath::DelegateIssue => ContractKind::Vault,
            SpendingPath::AdminRevoke | SpendingPath::DelegateRevoke => ContractKind::Certificate,
        }
    }

    /// Discriminant tag as (bits, bit count), MSB-first within `bits`.
    fn prefix(&self) -> (u8, u32) {
        match self {
            SpendingPath::AdminUnconditional => (0b0, 1),
            SpendingPath::AdminIssue => (0b10, 2),
            SpendingPath::DelegateIssue => (0b11, 2),
            SpendingPath::AdminRevoke => (0b0, 1),
            SpendingPath::DelegateRevoke => (0b1, 1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpendingPath::AdminUnconditional => "admin_unconditional",
            SpendingPath::AdminIssue => "admin_issue",
            SpendingPath::DelegateIssue => "delegate_issue",
            SpendingPath::AdminRevoke => "admin_revoke",
            SpendingPath::DelegateRevoke => "delegate_revoke",
        }
    }

    /// Encode the witness selecting this path, carrying `signature`.
    ///
    /// `signature` must be exactly 64 bytes. Nothing about its cryptographic
    /// validity is checked here.
    pub fn encode_witness(&self, signature: &[u8]) -> Result<Witness> {
        let sig: &[u8; SIGNATURE_SIZE] =
            signature
                .try_into()
                .map_err(|_| Error::InvalidSignatureLength {
                    got: signature.len(),
                })?;
        Ok(self.pack(sig))
    }

    /// Witness with the correct path tag and an all-zero signature.
    ///
    /// The dry run uses this to make the interpreter surface the
    /// transaction digest before any real signature exists.
    pub fn dummy_witness(&self) -> Witness {
        self.pack(&[0u8; SIGNATURE_SIZE])
    }

    fn pack(&self, signature: &[u8; SIGNATURE_SIZE]) -> Witness {
        let (bits, count) = self.prefix();
        let mut out = [0u8; WITNESS_SIZE];
        let mut pos = 0usize;
        for i in (0..count).rev() {
            set_bit(&mut out, pos, (bits >> i) & 1 == 1);
            pos += 1;
        }
        for &byte in signature {
            for i in (0..8).rev() {
                set_bit(&mut out, pos, (byte >> i) & 1 == 1);
                pos += 1;
            }
        }
        // Remaining bits to 520 stay zero: the deterministic padding.
        Witness(out)
    }
}

impl fmt::Display for SpendingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn set_bit(buf: &mut [u8], pos: usize, bit: bool) {
    if bit {
        buf[pos / 8] |= 1 << (7 - pos % 8);
    }
}

/// An encoded witness: always [`WITNESS_SIZE`] bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Witness([u8; WITNESS_SIZE]);

impl Witness {
    pub fn as_bytes(&self) -> &[u8; WITNESS_SIZE] {
        &self.0
    }

    /// Lowercase hex, the form the interpreter CLI takes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
