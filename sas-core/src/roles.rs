//! Roles and the static permission table.
//!
//! Two roles spend from the contracts: the admin (vault owner) and the
//! delegate (an issuing agent with narrower authority). Checks here run
//! before any interpreter or chain call, so a refused operation costs
//! nothing external.
//!
//! Revoke-own is a key identity check, not a role check: a delegate may
//! revoke only certificates recorded as issued under its own key. When no
//! issuer key was recorded the check fails closed rather than silently
//! widening to revoke-any.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::error::{Error, Result};
use crate::models::Outpoint;
use crate::witness::SpendingPath;

/// Spending roles known to both contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Delegate,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Delegate => "delegate",
        }
    }

    /// The permission table. Admin issues too: the vault covenant carries a
    /// dedicated admin-issue path for exactly that.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin => &[
                Permission::CertIssue,
                Permission::CertRevokeAny,
                Permission::VaultDrain,
            ],
            Role::Delegate => &[Permission::CertIssue, Permission::CertRevokeOwn],
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Vault witness path this role signs issuances with.
    pub fn issue_path(&self) -> SpendingPath {
        match self {
            Role::Admin => SpendingPath::AdminIssue,
            Role::Delegate => SpendingPath::DelegateIssue,
        }
    }

    /// Certificate witness path this role signs revocations with.
    pub fn revoke_path(&self) -> SpendingPath {
        match self {
            Role::Admin => SpendingPath::AdminRevoke,
            Role::Delegate => SpendingPath::DelegateRevoke,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the permission table knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    VaultDrain,
    CertIssue,
    CertRevokeOwn,
    CertRevokeAny,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::VaultDrain => "vault:drain",
            Permission::CertIssue => "cert:issue",
            Permission::CertRevokeOwn => "cert:revoke_own",
            Permission::CertRevokeAny => "cert:revoke_any",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refuse unless `role` holds `permission`.
pub fn authorize(role: Role, permission: Permission) -> Result<()> {
    if role.allows(permission) {
        Ok(())
    } else {
        Err(Error::PermissionDenied {
            role: role.as_str().to_string(),
            operation: permission.as_str().to_string(),
        })
    }
}

/// Revocation guard.
///
/// Admin revokes anything. A delegate passes only when the recorded issuer
/// key for `certificate` equals its own key; an absent record fails closed.
pub fn authorize_revoke(
    role: Role,
    revoker_key: &PublicKey,
    recorded_issuer: Option<&PublicKey>,
    certificate: &Outpoint,
) -> Result<()> {
    if role.allows(Permission::CertRevokeAny) {
        return Ok(());
    }
    authorize(role, Permission::CertRevokeOwn)?;
    match recorded_issuer {
        None => Err(Error::RoleMismatchUnverifiable {
            certificate: certificate.to_string(),
        }),
        Some(issuer) if issuer == revoker_key => Ok(()),
        Some(_) => Err(Error::NotCertificateIssuer {
            certificate: certificate.to_string(),
        }),
    }
}
