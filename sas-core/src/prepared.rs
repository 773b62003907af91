//! Caller-held prepared transactions.
//!
//! A [`PreparedTransaction`] is the immutable value the pipeline hands back
//! from every `prepare_*` call: the unsigned skeleton, the digest to sign,
//! and everything finalize needs later. The engine keeps no session for it.
//! Callers may hold it, ship the digest to an external signer, or abandon
//! it; an abandoned one simply expires.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::crypto::{PublicKey, SigningHash};
use crate::error::{Error, Result};
use crate::roles::Role;
use crate::witness::SpendingPath;

/// Prefix of every prepared-transaction id.
pub const PREPARED_ID_PREFIX: &str = "sas_txn_";

/// Default prepared-transaction lifetime, seconds.
pub const DEFAULT_TTL_SECS: i64 = 600;

/// Time-ordered prepared-transaction id (`sas_txn_` + UUIDv7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PreparedId(String);

impl PreparedId {
    /// Generate a new time-ordered id.
    pub fn new() -> Self {
        Self(format!("{PREPARED_ID_PREFIX}{}", Uuid::now_v7().simple()))
    }

    /// Parse an id from a string, enforcing the prefix.
    pub fn from_string(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if !s.starts_with(PREPARED_ID_PREFIX) {
            return Err(Error::ConfigurationError(format!(
                "prepared id must start with '{PREPARED_ID_PREFIX}', got: {}",
                if s.len() > 20 { &s[..20] } else { &s }
            )));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PreparedId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PreparedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a prepared transaction does when finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    IssueCertificate,
    RevokeCertificate,
    DrainVault,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::IssueCertificate => "issue_certificate",
            TransactionKind::RevokeCertificate => "revoke_certificate",
            TransactionKind::DrainVault => "drain_vault",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unsigned transaction skeleton plus the digest it commits to.
///
/// Immutable once constructed. `signing_hash` doubles as the pipeline's
/// idempotency key: recomputing the hash from the same skeleton is
/// deterministic, so a re-prepared identical transaction converges on the
/// same key.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedTransaction {
    pub id: PreparedId,
    pub kind: TransactionKind,
    /// The 32-byte digest the signature must commit to.
    pub signing_hash: SigningHash,
    /// Opaque skeleton in the interpreter's serialized form.
    pub pset: String,
    /// Input index the witness applies to.
    pub input_index: usize,
    /// Opaque compiled covenant program.
    pub program: String,
    pub path: SpendingPath,
    pub signer_role: Role,
    /// Key the covenant will verify the signature against.
    pub required_pubkey: PublicKey,
    /// Human-readable operation facts, for review and audit.
    pub details: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PreparedTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: TransactionKind,
        signing_hash: SigningHash,
        pset: String,
        input_index: usize,
        program: String,
        path: SpendingPath,
        signer_role: Role,
        required_pubkey: PublicKey,
        details: BTreeMap<String, String>,
        ttl: Duration,
    ) -> Self {
        let created_at = Utc::now();
        PreparedTransaction {
            id: PreparedId::new(),
            kind,
            signing_hash,
            pset,
            input_index,
            program,
            path,
            signer_role,
            required_pubkey,
            details,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// Whether the TTL has lapsed. An expired prepared transaction is
    /// treated as consumed.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time since preparation.
    pub fn age(&self) -> Duration {
        Utc::now() - self.created_at
    }

    /// One-line description for logs and signer review.
    pub fn summary(&self) -> String {
        format!(
            "{} [{}] path={} signer={} digest={} expires={}",
            self.kind,
            self.id,
            self.path,
            self.signer_role,
            self.signing_hash,
            self.expires_at.to_rfc3339(),
        )
    }
}
