//! Error types for the certificate engine.
//!
//! Errors are specific and actionable: a rejected annotation names the exact
//! byte-level problem, an authorization refusal names the role and the
//! operation, and external failures keep enough context (command, stderr,
//! HTTP status) to debug against the live tool or API.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Canonical error codes, stable across releases.
///
/// Every engine error maps to one of these. Protocol-specific
/// representations (strings for HTTP, numeric codes for RPC bridges) are
/// derived from them.
///
/// Code ranges:
/// - 1000-1099: Annotation wire errors
/// - 1100-1199: Signature and key errors
/// - 1200-1299: Authorization errors
/// - 1300-1399: Lifecycle and timing errors
/// - 1400-1499: Funds and lookup errors
/// - 1500-1599: Interpreter tool errors
/// - 1600-1699: Chain access errors
/// - 1700-1799: Input validation errors
/// - 1800-1899: Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Annotation wire errors (1000-1099)
    UnknownTag = 1000,
    UnsupportedVersion = 1001,
    TruncatedPayload = 1002,
    UnknownOperation = 1003,
    PayloadTooLarge = 1004,
    ReplacementRequiresReason = 1005,

    // Signature and key errors (1100-1199)
    InvalidSignatureLength = 1100,
    InvalidKey = 1101,
    SignatureInvalid = 1102,
    SignatureRejected = 1103,
    SigningHashUnavailable = 1104,
    InvalidSigningHash = 1105,

    // Authorization errors (1200-1299)
    PermissionDenied = 1200,
    NotCertificateIssuer = 1201,
    RoleMismatchUnverifiable = 1202,

    // Lifecycle and timing errors (1300-1399)
    TransactionExpired = 1300,
    ConfirmationTimeout = 1301,

    // Funds and lookup errors (1400-1499)
    InsufficientFunds = 1400,
    VaultEmpty = 1401,
    UtxoNotFound = 1402,
    TransactionNotFound = 1403,

    // Interpreter tool errors (1500-1599)
    InterpreterNotFound = 1500,
    InterpreterFailed = 1501,
    InvalidInterpreterOutput = 1502,

    // Chain access errors (1600-1699)
    Network = 1600,
    Api = 1601,
    BroadcastRejected = 1602,
    Timeout = 1603,

    // Input validation errors (1700-1799)
    InvalidTxid = 1700,
    InvalidOutpoint = 1701,

    // Configuration errors (1800-1899)
    Configuration = 1800,
}

impl ErrorCode {
    /// Get the numeric code value.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Get machine-readable name (kebab-case).
    ///
    /// This is the canonical string representation used in HTTP APIs.
    pub fn name(self) -> &'static str {
        match self {
            // Annotation wire errors
            Self::UnknownTag => "unknown-tag",
            Self::UnsupportedVersion => "unsupported-version",
            Self::TruncatedPayload => "truncated-payload",
            Self::UnknownOperation => "unknown-operation",
            Self::PayloadTooLarge => "payload-too-large",
            Self::ReplacementRequiresReason => "replacement-requires-reason",

            // Signature and key errors
            Self::InvalidSignatureLength => "invalid-signature-length",
            Self::InvalidKey => "invalid-key",
            Self::SignatureInvalid => "signature-invalid",
            Self::SignatureRejected => "signature-rejected",
            Self::SigningHashUnavailable => "signing-hash-unavailable",
            Self::InvalidSigningHash => "invalid-signing-hash",

            // Authorization errors
            Self::PermissionDenied => "permission-denied",
            Self::NotCertificateIssuer => "not-certificate-issuer",
            Self::RoleMismatchUnverifiable => "role-mismatch-unverifiable",

            // Lifecycle and timing errors
            Self::TransactionExpired => "transaction-expired",
            Self::ConfirmationTimeout => "confirmation-timeout",

            // Funds and lookup errors
            Self::InsufficientFunds => "insufficient-funds",
            Self::VaultEmpty => "vault-empty",
            Self::UtxoNotFound => "utxo-not-found",
            Self::TransactionNotFound => "transaction-not-found",

            // Interpreter tool errors
            Self::InterpreterNotFound => "interpreter-not-found",
            Self::InterpreterFailed => "interpreter-failed",
            Self::InvalidInterpreterOutput => "invalid-interpreter-output",

            // Chain access errors
            Self::Network => "network",
            Self::Api => "api",
            Self::BroadcastRejected => "broadcast-rejected",
            Self::Timeout => "timeout",

            // Input validation errors
            Self::InvalidTxid => "invalid-txid",
            Self::InvalidOutpoint => "invalid-outpoint",

            // Configuration errors
            Self::Configuration => "configuration",
        }
    }

    /// Get HTTP status code based on error category.
    pub fn http_status(self) -> u16 {
        match self.code() / 100 {
            10 => 400, // Wire errors -> Bad Request
            11 => 401, // Signature errors -> Unauthorized
            12 => 403, // Authorization errors -> Forbidden
            13 => 408, // Lifecycle/timing errors -> Request Timeout
            14 => 409, // Funds/lookup errors -> Conflict
            15 => 502, // Interpreter errors -> Bad Gateway
            16 => 502, // Chain errors -> Bad Gateway
            17 => 400, // Input errors -> Bad Request
            18 => 500, // Configuration -> Internal Error
            _ => 500,  // Unknown -> Internal Error
        }
    }

    /// Get human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            // Annotation wire errors
            Self::UnknownTag => "Annotation tag not recognized",
            Self::UnsupportedVersion => "Annotation version not supported",
            Self::TruncatedPayload => "Annotation payload is truncated",
            Self::UnknownOperation => "Annotation operation not recognized",
            Self::PayloadTooLarge => "Annotation payload exceeds the OP_RETURN budget",
            Self::ReplacementRequiresReason => "Replacement txid given without a reason code",

            // Signature and key errors
            Self::InvalidSignatureLength => "Signature length is invalid",
            Self::InvalidKey => "Key material is invalid",
            Self::SignatureInvalid => "Signature verification failed",
            Self::SignatureRejected => "Covenant rejected the signature",
            Self::SigningHashUnavailable => "Dry run produced no transaction digest",
            Self::InvalidSigningHash => "Transaction digest is malformed",

            // Authorization errors
            Self::PermissionDenied => "Role is not allowed to perform the operation",
            Self::NotCertificateIssuer => "Revoking key did not issue this certificate",
            Self::RoleMismatchUnverifiable => "Issuer association cannot be verified",

            // Lifecycle and timing errors
            Self::TransactionExpired => "Prepared transaction has expired",
            Self::ConfirmationTimeout => "Confirmation wait timed out",

            // Funds and lookup errors
            Self::InsufficientFunds => "Not enough funds for the operation",
            Self::VaultEmpty => "Vault has no spendable outputs",
            Self::UtxoNotFound => "Outpoint not found",
            Self::TransactionNotFound => "Transaction not found",

            // Interpreter tool errors
            Self::InterpreterNotFound => "Interpreter binary not found",
            Self::InterpreterFailed => "Interpreter invocation failed",
            Self::InvalidInterpreterOutput => "Interpreter output could not be parsed",

            // Chain access errors
            Self::Network => "Network transport failure",
            Self::Api => "Chain API returned an error",
            Self::BroadcastRejected => "Broadcast was rejected",
            Self::Timeout => "External call timed out",

            // Input validation errors
            Self::InvalidTxid => "Transaction id is malformed",
            Self::InvalidOutpoint => "Outpoint is malformed",

            // Configuration errors
            Self::Configuration => "Configuration is invalid",
        }
    }
}

/// Errors that can occur in engine operations.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Annotation Protocol Errors
    // =========================================================================
    /// First three bytes do not match the protocol tag.
    #[error("unknown annotation tag (expected \"SAS\")")]
    UnknownTag,

    /// Version byte names a version this decoder does not speak.
    #[error("unsupported annotation version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// Declared substructure does not fit the remaining bytes.
    #[error("truncated annotation payload: need {expected} bytes, have {actual}")]
    TruncatedPayload { expected: usize, actual: usize },

    /// Type byte names no operation in this version.
    #[error("unknown annotation operation: {0:#04x}")]
    UnknownOperation(u8),

    /// Payload exceeds the OP_RETURN budget.
    #[error("annotation payload {size} bytes exceeds maximum {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// A replacement txid is only legal alongside a reason code.
    #[error("replacement txid requires a reason code")]
    ReplacementRequiresReason,

    // =========================================================================
    // Signature & Key Errors
    // =========================================================================
    /// Witness signatures are exactly 64 bytes (BIP340).
    #[error("invalid signature length: expected 64 bytes, got {got}")]
    InvalidSignatureLength { got: usize },

    /// Key material failed to parse or validate.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Local signature verification failed.
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    /// The covenant dry run rejected the witness.
    #[error("covenant rejected the signature: failed jets {failed_jets:?}")]
    SignatureRejected { failed_jets: Vec<String> },

    /// The dry run trace carried no `sig_all_hash` jet.
    #[error("interpreter run produced no sig_all_hash")]
    SigningHashUnavailable,

    /// Transaction digest must be 32 bytes of hex.
    #[error("invalid signing hash: {0}")]
    InvalidSigningHash(String),

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    /// Role lacks the permission for this operation.
    #[error("role '{role}' is not allowed to perform '{operation}'")]
    PermissionDenied { role: String, operation: String },

    /// Delegate revocation of a certificate issued under a different key.
    #[error("delegate key did not issue certificate {certificate}")]
    NotCertificateIssuer { certificate: String },

    /// No recorded issuer key to check revoke-own against. Fails closed.
    #[error("cannot verify issuer for certificate {certificate}: no recorded issuer key")]
    RoleMismatchUnverifiable { certificate: String },

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// Prepared transaction TTL lapsed before finalize.
    #[error("prepared transaction expired at {0}")]
    TransactionExpired(chrono::DateTime<chrono::Utc>),

    /// Confirmation polling gave up.
    #[error("confirmation timeout for {txid}: waited {waited_secs}s, {confirmations} confirmations")]
    ConfirmationTimeout {
        txid: String,
        waited_secs: u64,
        confirmations: u64,
    },

    // =========================================================================
    // Funds & Lookup Errors
    // =========================================================================
    /// Selected utxo cannot fund the output plan.
    #[error("insufficient funds: need {required} sats, have {available} sats")]
    InsufficientFunds { required: u64, available: u64 },

    /// Vault address holds nothing spendable.
    #[error("vault {0} has no spendable utxos")]
    VaultEmpty(String),

    /// Outpoint not present on the address.
    #[error("utxo not found: {0}")]
    UtxoNotFound(String),

    /// Transaction unknown to the chain backend.
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    // =========================================================================
    // Interpreter Tool Errors
    // =========================================================================
    /// Interpreter binary missing from the configured path.
    #[error("interpreter binary not found at '{path}'")]
    InterpreterNotFound { path: String },

    /// Interpreter exited non-zero or reported an error.
    #[error("interpreter '{command}' failed: {detail}")]
    InterpreterFailed { command: String, detail: String },

    /// Interpreter stdout was not the expected JSON.
    #[error("unparseable interpreter output: {0}")]
    InvalidInterpreterOutput(String),

    // =========================================================================
    // Chain Access Errors
    // =========================================================================
    /// Transport-level failure talking to the chain API.
    #[error("network error: {0}")]
    Network(String),

    /// Chain API answered with an error status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Node refused the transaction. Terminal for this skeleton.
    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),

    /// External call timed out. Outcome unknown, not necessarily failed.
    #[error("timed out during {0}")]
    Timeout(String),

    // =========================================================================
    // Input Validation Errors
    // =========================================================================
    /// Txid must be 64 hex chars.
    #[error("invalid txid: {0}")]
    InvalidTxid(String),

    /// Outpoint must be `txid:vout`.
    #[error("invalid outpoint: {0}")]
    InvalidOutpoint(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file missing, unreadable, or inconsistent.
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}

impl Error {
    /// Map this error to a canonical error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            // Annotation Protocol Errors
            Self::UnknownTag => ErrorCode::UnknownTag,
            Self::UnsupportedVersion(_) => ErrorCode::UnsupportedVersion,
            Self::TruncatedPayload { .. } => ErrorCode::TruncatedPayload,
            Self::UnknownOperation(_) => ErrorCode::UnknownOperation,
            Self::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            Self::ReplacementRequiresReason => ErrorCode::ReplacementRequiresReason,

            // Signature & Key Errors
            Self::InvalidSignatureLength { .. } => ErrorCode::InvalidSignatureLength,
            Self::InvalidKey(_) => ErrorCode::InvalidKey,
            Self::SignatureInvalid(_) => ErrorCode::SignatureInvalid,
            Self::SignatureRejected { .. } => ErrorCode::SignatureRejected,
            Self::SigningHashUnavailable => ErrorCode::SigningHashUnavailable,
            Self::InvalidSigningHash(_) => ErrorCode::InvalidSigningHash,

            // Authorization Errors
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::NotCertificateIssuer { .. } => ErrorCode::NotCertificateIssuer,
            Self::RoleMismatchUnverifiable { .. } => ErrorCode::RoleMismatchUnverifiable,

            // Lifecycle Errors
            Self::TransactionExpired(_) => ErrorCode::TransactionExpired,
            Self::ConfirmationTimeout { .. } => ErrorCode::ConfirmationTimeout,

            // Funds & Lookup Errors
            Self::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            Self::VaultEmpty(_) => ErrorCode::VaultEmpty,
            Self::UtxoNotFound(_) => ErrorCode::UtxoNotFound,
            Self::TransactionNotFound(_) => ErrorCode::TransactionNotFound,

            // Interpreter Tool Errors
            Self::InterpreterNotFound { .. } => ErrorCode::InterpreterNotFound,
            Self::InterpreterFailed { .. } => ErrorCode::InterpreterFailed,
            Self::InvalidInterpreterOutput(_) => ErrorCode::InvalidInterpreterOutput,

            // Chain Access Errors
            Self::Network(_) => ErrorCode::Network,
            Self::Api { .. } => ErrorCode::Api,
            Self::BroadcastRejected(_) => ErrorCode::BroadcastRejected,
            Self::Timeout(_) => ErrorCode::Timeout,

            // Input Validation Errors
            Self::InvalidTxid(_) => ErrorCode::InvalidTxid,
            Self::InvalidOutpoint(_) => ErrorCode::InvalidOutpoint,

            // Configuration Errors
            Self::ConfigurationError(_) => ErrorCode::Configuration,
        }
    }

    /// Get the machine-readable error name (kebab-case).
    pub fn name(&self) -> &'static str {
        self.code().name()
    }

    /// Get HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        self.code().http_status()
    }

    /// Get human-readable description.
    pub fn description(&self) -> &'static str {
        self.code().description()
    }
}
