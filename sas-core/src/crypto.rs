//! BIP340 Schnorr keys, signatures, and the transaction digest they sign.
//!
//! The covenant verifies 64-byte Schnorr signatures over secp256k1 against
//! x-only public keys, so that is exactly what this module produces. The
//! digest being signed is never computed here: it is the `sig_all_hash` the
//! interpreter surfaces during the dry run.
//!
//! ## Security
//!
//! Private keys are wrapped in `Secret` for:
//! 1. Redacted `Debug` output (no keys in logs)
//! 2. Zeroization on drop
//! 3. Safe cloning

use std::fmt;
use std::str::FromStr;

use secp256k1::schnorr;
use secp256k1::{Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};
use secrecy::{CloneableSecret, ExposeSecret, Secret, Zeroize};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// The 32-byte transaction digest the covenant expects a signature over.
///
/// Extracted from the `sig_all_hash` jet of the dry run. Doubles as the
/// idempotency key of the finalize step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigningHash([u8; 32]);

impl SigningHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        SigningHash(bytes)
    }

    /// Parse from hex. A leading `0x`, as the interpreter prints it, is fine.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(Error::InvalidSigningHash(format!(
                "expected 64 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::InvalidSigningHash(e.to_string()))?;
        Ok(SigningHash(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SigningHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for SigningHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SigningHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SigningHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// Wrapper so `Secret` can hold the secp256k1 key. The library offers
// non_secure_erase for clearing; Zeroize routes through it.
#[derive(Clone)]
struct SchnorrKeyWrapper(SecretKey);

impl Zeroize for SchnorrKeyWrapper {
    fn zeroize(&mut self) {
        self.0.non_secure_erase();
    }
}

/// Marker trait for Secrecy to allow cloning Secret<T>
impl CloneableSecret for SchnorrKeyWrapper {}

/// A BIP340 signing key.
///
/// The x-only public key is derived once at construction; signing never
/// re-derives it.
#[derive(Clone)]
pub struct SigningKey {
    secret: Secret<SchnorrKeyWrapper>,
    public: PublicKey,
}

impl SigningKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::new(&mut rand::thread_rng()))
    }

    /// Construct from 32 raw bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let sk = SecretKey::from_slice(bytes).map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok(Self::from_secret(sk))
    }

    /// Construct from a 64-char hex string (the config file's key format).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 64 {
            return Err(Error::InvalidKey(format!(
                "expected 64 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| Error::InvalidKey(e.to_string()))?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    fn from_secret(sk: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &sk);
        let (xonly, _parity) = XOnlyPublicKey::from_keypair(&keypair);
        SigningKey {
            secret: Secret::new(SchnorrKeyWrapper(sk)),
            public: PublicKey(xonly),
        }
    }

    /// The x-only public key the covenant checks against.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Sign a transaction digest. Deterministic (BIP340, no aux randomness).
    pub fn sign(&self, digest: &SigningHash) -> Signature {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &self.secret.expose_secret().0);
        let msg = Message::from_digest(*digest.as_bytes());
        let sig = secp.sign_schnorr_no_aux_rand(&msg, &keypair);
        Signature(sig.serialize())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("secret", &"***SECRET***")
            .field("public", &self.public.to_hex())
            .finish()
    }
}

/// An x-only secp256k1 public key (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(XOnlyPublicKey);

impl PublicKey {
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| Error::InvalidKey(e.to_string()))?;
        let xonly =
            XOnlyPublicKey::from_slice(&bytes).map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok(PublicKey(xonly))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.serialize())
    }

    /// Short form for logs: the first four bytes.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0.serialize()[..4])
    }

    /// Verify a BIP340 signature over `digest`.
    pub fn verify(&self, digest: &SigningHash, signature: &Signature) -> Result<()> {
        let secp = Secp256k1::new();
        let sig = schnorr::Signature::from_slice(signature.as_bytes())
            .map_err(|e| Error::SignatureInvalid(e.to_string()))?;
        let msg = Message::from_digest(*digest.as_bytes());
        secp.verify_schnorr(&sig, &msg, &self.0)
            .map_err(|e| Error::SignatureInvalid(e.to_string()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PublicKey::from_hex(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 64-byte BIP340 Schnorr signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let sig: [u8; 64] = bytes
            .try_into()
            .map_err(|_| Error::InvalidSignatureLength { got: bytes.len() })?;
        Ok(Signature(sig))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| Error::SignatureInvalid(format!("bad hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKey::generate();
        let digest = SigningHash::from_bytes([7u8; 32]);
        let sig = key.sign(&digest);
        key.public_key().verify(&digest, &sig).unwrap();
    }

    #[test]
    fn test_verify_rejects_wrong_digest() {
        let key = SigningKey::generate();
        let sig = key.sign(&SigningHash::from_bytes([7u8; 32]));
        match key
            .public_key()
            .verify(&SigningHash::from_bytes([8u8; 32]), &sig)
        {
            Err(Error::SignatureInvalid(_)) => {}
            res => panic!("Expected SignatureInvalid, got {:?}", res),
        }
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let key = SigningKey::generate();
        let other = SigningKey::generate();
        let digest = SigningHash::from_bytes([7u8; 32]);
        let sig = key.sign(&digest);
        match other.public_key().verify(&digest, &sig) {
            Err(Error::SignatureInvalid(_)) => {}
            res => panic!("Expected SignatureInvalid, got {:?}", res),
        }
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = SigningKey::generate();
        let digest = SigningHash::from_bytes([9u8; 32]);
        assert_eq!(key.sign(&digest), key.sign(&digest));
    }

    #[test]
    fn test_key_hex_roundtrip() {
        let key = SigningKey::generate();
        let pubkey_hex = key.public_key().to_hex();
        assert_eq!(pubkey_hex.len(), 64);
        let parsed = PublicKey::from_hex(&pubkey_hex).unwrap();
        assert_eq!(parsed, key.public_key());
    }

    #[test]
    fn test_from_hex_rejects_bad_keys() {
        match SigningKey::from_hex("abcd") {
            Err(Error::InvalidKey(_)) => {}
            res => panic!("Expected InvalidKey, got {:?}", res),
        }
        // All zeros is outside the valid secret key range.
        match SigningKey::from_hex(&"00".repeat(32)) {
            Err(Error::InvalidKey(_)) => {}
            res => panic!("Expected InvalidKey, got {:?}", res),
        }
    }

    #[test]
    fn test_debug_never_prints_key_material() {
        let key = SigningKey::from_hex(&"11".repeat(32)).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("***SECRET***"));
        assert!(!debug.contains(&"11".repeat(32)));
    }

    #[test]
    fn test_signature_length_gate() {
        match Signature::from_bytes(&[0u8; 63]) {
            Err(Error::InvalidSignatureLength { got: 63 }) => {}
            res => panic!("Expected InvalidSignatureLength, got {:?}", res),
        }
        match Signature::from_bytes(&[0u8; 65]) {
            Err(Error::InvalidSignatureLength { got: 65 }) => {}
            res => panic!("Expected InvalidSignatureLength, got {:?}", res),
        }
        assert!(Signature::from_bytes(&[0u8; 64]).is_ok());
    }

    #[test]
    fn test_signing_hash_accepts_0x_prefix() {
        let bare = "aa".repeat(32);
        let prefixed = format!("0x{bare}");
        assert_eq!(
            SigningHash::from_hex(&bare).unwrap(),
            SigningHash::from_hex(&prefixed).unwrap()
        );
        match SigningHash::from_hex("0xabcd") {
            Err(Error::InvalidSigningHash(_)) => {}
            res => panic!("Expected InvalidSigningHash, got {:?}", res),
        }
    }

    #[test]
    fn test_fingerprint_is_short_prefix() {
        let key = SigningKey::generate();
        let fp = key.public_key().fingerprint();
        assert_eq!(fp.len(), 8);
        assert!(key.public_key().to_hex().starts_with(&fp));
    }
}
