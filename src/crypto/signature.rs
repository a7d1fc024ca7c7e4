// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Token signing (spec §4.1): `HMAC-SHA256(signing_secret, base64(payload))`,
// wire form `"<base64_payload>.<hex_hmac>"`, compared in constant time.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Signs `payload_bytes` and returns the full `"<base64>.<hex>"` wire token.
pub fn sign_token(signing_secret: &str, payload_bytes: &[u8]) -> String {
    let payload_b64 = STANDARD.encode(payload_bytes);
    let hmac_hex = hmac_hex(signing_secret, payload_b64.as_bytes());
    format!("{payload_b64}.{hmac_hex}")
}

/// Splits a wire token into `(payload_b64, hmac_hex)`. Returns `None` if
/// either half is missing (maps to `TOKEN_FORMAT` upstream).
pub fn split_token(token: &str) -> Option<(&str, &str)> {
    let mut parts = token.splitn(2, '.');
    let payload = parts.next()?;
    let hmac = parts.next()?;
    if payload.is_empty() || hmac.is_empty() {
        return None;
    }
    Some((payload, hmac))
}

/// Verifies `hmac_hex` against a freshly-computed HMAC of `payload_b64` in
/// constant time (maps to `TOKEN_SIGNATURE` on mismatch upstream).
pub fn verify_signature(signing_secret: &str, payload_b64: &str, hmac_hex: &str) -> bool {
    let expected = hmac_hex_bytes(signing_secret, payload_b64.as_bytes());
    let Ok(given) = hex::decode(hmac_hex) else { return false };
    if given.len() != expected.len() {
        return false;
    }
    expected.ct_eq(&given).into()
}

fn hmac_hex(secret: &str, message: &[u8]) -> String {
    hex::encode(hmac_hex_bytes(secret, message))
}

fn hmac_hex_bytes(secret: &str, message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_split_then_verify_round_trips() {
        let token = sign_token("secret", b"payload-bytes");
        let (payload, hmac) = split_token(&token).unwrap();
        assert!(verify_signature("secret", payload, hmac));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let token = sign_token("secret", b"payload-bytes");
        let (payload, hmac) = split_token(&token).unwrap();
        assert!(!verify_signature("other-secret", payload, hmac));
    }

    #[test]
    fn missing_separator_has_no_split() {
        assert!(split_token("no-dot-here").is_none());
        assert!(split_token("payload.").is_none());
        assert!(split_token(".hmac").is_none());
    }

    #[test]
    fn tampered_hmac_fails() {
        let token = sign_token("secret", b"payload-bytes");
        let (payload, hmac) = split_token(&token).unwrap();
        let mut tampered = hmac.to_string();
        tampered.replace_range(0..2, "ff");
        assert!(!verify_signature("secret", payload, &tampered));
    }
}
