//! Bit-exact witness layout checks against an independent bit-vector
//! oracle, plus end-to-end signature embedding.

use sas_core::crypto::{SigningHash, SigningKey};
use sas_core::witness::{SpendingPath, SIGNATURE_SIZE, WITNESS_SIZE};

/// (path, MSB-first tag bits) for every spending path.
const TAGS: [(SpendingPath, &[bool]); 5] = [
    (SpendingPath::AdminUnconditional, &[false]),
    (SpendingPath::AdminIssue, &[true, false]),
    (SpendingPath::DelegateIssue, &[true, true]),
    (SpendingPath::AdminRevoke, &[false]),
    (SpendingPath::DelegateRevoke, &[true]),
];

/// Straightforward reference encoder: push the tag bits, then every
/// signature bit MSB-first, then pad with zeros to 520 bits.
fn oracle(tag: &[bool], signature: &[u8; SIGNATURE_SIZE]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(WITNESS_SIZE * 8);
    bits.extend_from_slice(tag);
    for &byte in signature {
        for i in (0..8).rev() {
            bits.push(byte >> i & 1 == 1);
        }
    }
    bits.resize(WITNESS_SIZE * 8, false);

    let mut out = vec![0u8; WITNESS_SIZE];
    for (pos, &bit) in bits.iter().enumerate() {
        if bit {
            out[pos / 8] |= 1 << (7 - pos % 8);
        }
    }
    out
}

/// Read the 512 signature bits back out of an encoded witness.
fn embedded_signature(witness: &[u8; WITNESS_SIZE], tag_len: usize) -> [u8; SIGNATURE_SIZE] {
    let mut signature = [0u8; SIGNATURE_SIZE];
    for i in 0..SIGNATURE_SIZE * 8 {
        let pos = tag_len + i;
        let bit = witness[pos / 8] >> (7 - pos % 8) & 1;
        signature[i / 8] |= bit << (7 - i % 8);
    }
    signature
}

fn patterned_signature() -> [u8; SIGNATURE_SIZE] {
    let mut signature = [0u8; SIGNATURE_SIZE];
    for (i, byte) in signature.iter_mut().enumerate() {
        *byte = i as u8;
    }
    signature
}

#[test]
fn test_every_path_matches_the_bit_oracle() {
    let signatures = [
        patterned_signature(),
        [0x00; SIGNATURE_SIZE],
        [0xFF; SIGNATURE_SIZE],
        [0xA5; SIGNATURE_SIZE],
    ];
    for (path, tag) in TAGS {
        for signature in &signatures {
            let witness = path.encode_witness(signature).unwrap();
            assert_eq!(
                witness.as_bytes().as_slice(),
                oracle(tag, signature).as_slice(),
                "layout mismatch on {path}"
            );
        }
    }
}

#[test]
fn test_witness_hex_is_lowercase_and_130_chars() {
    let witness = SpendingPath::DelegateIssue
        .encode_witness(&[0xAB; SIGNATURE_SIZE])
        .unwrap();
    let hex = witness.to_hex();
    assert_eq!(hex.len(), WITNESS_SIZE * 2);
    assert_eq!(hex, hex.to_lowercase());
    assert_eq!(hex::decode(&hex).unwrap(), witness.as_bytes());
}

#[test]
fn test_prefix_freedom_is_per_contract() {
    // The vault's unconditional path and the certificate's admin-revoke
    // path share the tag bit `0`: they belong to different contracts and
    // are never decoded against each other, so their encodings may alias.
    let signature = patterned_signature();
    let vault = SpendingPath::AdminUnconditional
        .encode_witness(&signature)
        .unwrap();
    let certificate = SpendingPath::AdminRevoke.encode_witness(&signature).unwrap();
    assert_eq!(vault, certificate);
}

#[test]
fn test_real_schnorr_signature_survives_embedding() {
    let key = SigningKey::from_hex(&"42".repeat(32)).unwrap();
    let digest = SigningHash::from_bytes([0x1D; 32]);
    let signature = key.sign(&digest);

    for (path, tag) in TAGS {
        let witness = path.encode_witness(signature.as_bytes()).unwrap();
        let recovered = embedded_signature(witness.as_bytes(), tag.len());
        assert_eq!(&recovered, signature.as_bytes(), "corrupted on {path}");

        // The bits the covenant reads are the bits the verifier accepts.
        let recovered = sas_core::crypto::Signature::from_bytes(&recovered).unwrap();
        key.public_key().verify(&digest, &recovered).unwrap();
    }
}

#[test]
fn test_dummy_and_real_witness_share_the_tag_bits() {
    let signature = patterned_signature();
    for (path, tag) in TAGS {
        let dummy = path.dummy_witness();
        let real = path.encode_witness(&signature).unwrap();
        for pos in 0..tag.len() {
            let dummy_bit = dummy.as_bytes()[pos / 8] >> (7 - pos % 8) & 1;
            let real_bit = real.as_bytes()[pos / 8] >> (7 - pos % 8) & 1;
            assert_eq!(dummy_bit, real_bit, "tag bit {pos} differs on {path}");
        }
    }
}
