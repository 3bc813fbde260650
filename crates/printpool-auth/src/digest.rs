// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Password digests: SHA-256 hashing so plaintext passwords are never stored.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `password` and return it as a lowercase hex string.
pub fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check `password` against a stored hex digest.
///
/// Compares every byte so the time taken does not depend on where the
/// first mismatch is.
pub fn verify_password(password: &str, expected_hex: &str) -> bool {
    let actual = password_digest(password);
    if actual.len() != expected_hex.len() {
        return false;
    }
    actual
        .bytes()
        .zip(expected_hex.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
