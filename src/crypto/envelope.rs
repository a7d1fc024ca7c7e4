// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Hybrid RSA+AES envelope encryption (spec §4.1, §9). Layout:
//
//     RSA_OAEP(pubkey, aes_key) ‖ iv(16B) ‖ AES-256-CBC(aes_key, iv, plaintext)
//
// base64-encoded at the boundary. Any change to this layout requires a
// versioned envelope prefix (spec §9) — none exists yet, so this is v0.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const AES_KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("CRYPTO_DECRYPT: {0}")]
    Decrypt(String),
    #[error("CRYPTO_ENCRYPT: {0}")]
    Encrypt(String),
}

/// Encrypts `plaintext` for `pubkey`, returning the base64 envelope.
pub fn encrypt(plaintext: &[u8], pubkey: &RsaPublicKey) -> Result<String, CryptoError> {
    let mut rng = rand::rng();

    let mut aes_key = [0u8; AES_KEY_LEN];
    rng.fill_bytes(&mut aes_key);
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let wrapped_key = pubkey
        .encrypt(&mut rng, Oaep::new::<Sha256>(), &aes_key)
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    let ciphertext = Aes256CbcEnc::new(&aes_key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut blob = Vec::with_capacity(wrapped_key.len() + IV_LEN + ciphertext.len());
    blob.extend_from_slice(&wrapped_key);
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(blob))
}

/// Reverses [`encrypt`]; fails with `CryptoError::Decrypt` on any
/// length/padding/tag error (spec §4.1).
pub fn decrypt(envelope_b64: &str, privkey: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    let blob = STANDARD
        .decode(envelope_b64)
        .map_err(|e| CryptoError::Decrypt(format!("invalid base64: {e}")))?;

    let key_len = privkey.size();
    if blob.len() < key_len + IV_LEN {
        return Err(CryptoError::Decrypt("envelope too short".to_string()));
    }

    let (wrapped_key, rest) = blob.split_at(key_len);
    let (iv, ciphertext) = rest.split_at(IV_LEN);

    let aes_key = privkey
        .decrypt(Oaep::new::<Sha256>(), wrapped_key)
        .map_err(|e| CryptoError::Decrypt(format!("RSA unwrap failed: {e}")))?;
    if aes_key.len() != AES_KEY_LEN {
        return Err(CryptoError::Decrypt("unwrapped AES key has the wrong length".to_string()));
    }

    let plaintext = Aes256CbcDec::new(aes_key.as_slice().into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| CryptoError::Decrypt(format!("AES/padding error: {e}")))?;

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};

    // Fixed 2048-bit test keypair (not used outside this test module).
    fn test_keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let mut rng = rand::rng();
        let priv_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
        let pub_key = RsaPublicKey::from(&priv_key);
        (priv_key, pub_key)
    }

    #[test]
    fn round_trips_plaintext() {
        let (priv_key, pub_key) = test_keypair();
        let plaintext = b"super-secret-api-key".to_vec();
        let envelope = encrypt(&plaintext, &pub_key).unwrap();
        let decrypted = decrypt(&envelope, &priv_key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn tampered_envelope_fails_to_decrypt() {
        let (priv_key, pub_key) = test_keypair();
        let envelope = encrypt(b"data", &pub_key).unwrap();
        let mut blob = STANDARD.decode(&envelope).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        let tampered = STANDARD.encode(blob);
        assert!(decrypt(&tampered, &priv_key).is_err());
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let (_priv_key, pub_key) = test_keypair();
        let (other_priv, _) = test_keypair();
        let envelope = encrypt(b"data", &pub_key).unwrap();
        assert!(decrypt(&envelope, &other_priv).is_err());
    }

    #[test]
    fn pkcs1_der_helpers_parse_test_key_pem() {
        let (priv_key, pub_key) = test_keypair();
        let priv_pem = priv_key.to_pkcs1_pem(Default::default()).unwrap();
        let reparsed = RsaPrivateKey::from_pkcs1_pem(&priv_pem).unwrap();
        assert_eq!(RsaPublicKey::from(&reparsed), pub_key);
    }
}
