//! Hashing helpers for voter identifiers and one-time codes.
//!
//! Aadhaar numbers, OTPs and simulated fingerprint templates are never
//! compared in plain text once stored; they go through [`sha256_hex`].

use rand::Rng;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `input`.
#[must_use]
pub fn sha256_hex(input: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(input.as_ref()))
}

/// Hash of a 12-digit Aadhaar number, namespaced so it cannot collide with
/// other hashed values stored alongside it.
#[must_use]
pub fn hash_aadhaar(aadhaar_id: &str) -> String {
    sha256_hex(format!("aadhaar:{aadhaar_id}"))
}

/// Random numeric code of `digits` length, leading zeroes preserved.
#[must_use]
pub fn generate_numeric_code(digits: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..digits)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Whether `value` is exactly twelve ASCII digits.
#[must_use]
pub fn is_valid_aadhaar(value: &str) -> bool {
    value.len() == 12 && value.bytes().all(|b| b.is_ascii_digit())
}
